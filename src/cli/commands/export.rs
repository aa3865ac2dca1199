//! Export command implementation

use super::{describe, describe_tensor, format_bytes};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{ExportArgs, ExportManifest};
use crate::export::ExportPipeline;

pub fn run_export(args: ExportArgs, level: LogLevel) -> Result<(), String> {
    let plan = ExportManifest::from_args(&args)
        .and_then(ExportManifest::into_plan)
        .map_err(describe)?;

    log(
        level,
        LogLevel::Normal,
        &format!("Exporting {} -> {}", plan.base.display(), plan.output_dir.display()),
    );
    match &plan.adapter {
        Some(adapter) => log(level, LogLevel::Verbose, &format!("  Adapter: {}", adapter.display())),
        None => log(level, LogLevel::Normal, "  No adapter given, converting the base model only"),
    }
    if let Some(preset) = plan.preset {
        log(level, LogLevel::Verbose, &format!("  Preset: {preset}"));
    }
    log(
        level,
        LogLevel::Verbose,
        &format!("  Format: {} ({})", plan.format, plan.dtype),
    );

    let pipeline = ExportPipeline::new(plan);
    let summary = pipeline
        .run_with(|tensor| log(level, LogLevel::Verbose, &describe_tensor(tensor)))
        .map_err(describe)?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Export complete: {} tensors written ({} merged, {} skipped), {} parameters, {} in {:.1}s",
            summary.tensors_written,
            summary.tensors_merged,
            summary.tensors_skipped,
            summary.parameters,
            format_bytes(summary.bytes_written),
            summary.duration_secs
        ),
    );
    log(
        level,
        LogLevel::Normal,
        &format!("  Weights: {}", summary.weights_path.display()),
    );
    log(
        level,
        LogLevel::Normal,
        &format!("  Params:  {}", summary.params_path.display()),
    );
    if let Some(tokenizer) = &summary.tokenizer_path {
        log(
            level,
            LogLevel::Normal,
            &format!("  Tokenizer: {}", tokenizer.display()),
        );
    }

    Ok(())
}
