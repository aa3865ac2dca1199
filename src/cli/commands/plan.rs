//! Plan command implementation

use super::{describe, describe_tensor};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{ExportArgs, ExportManifest};
use crate::export::ExportPipeline;

pub fn run_plan(args: ExportArgs, level: LogLevel) -> Result<(), String> {
    let plan = ExportManifest::from_args(&args)
        .and_then(ExportManifest::into_plan)
        .map_err(describe)?;

    let output = plan.output_dir.join(plan.format.file_name());
    let (params, tensors) = ExportPipeline::new(plan).dry_run().map_err(describe)?;

    log(level, LogLevel::Normal, &format!("Plan for {}:", output.display()));
    for tensor in &tensors {
        log(level, LogLevel::Normal, &describe_tensor(tensor));
    }

    let written = tensors.iter().filter(|t| t.target.is_some()).count();
    let merged = tensors.iter().filter(|t| t.merged).count();
    log(
        level,
        LogLevel::Normal,
        &format!(
            "{written} tensors to write ({merged} merged, {} skipped); dim={} n_heads={} n_layers={}",
            tensors.len() - written,
            params.dim,
            params.n_heads,
            params.n_layers
        ),
    );

    if level == LogLevel::Verbose {
        let json = params.to_json().map_err(describe)?;
        log(level, LogLevel::Verbose, &json);
    }

    Ok(())
}
