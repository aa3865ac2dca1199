//! Presets command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::PresetsArgs;
use crate::presets::Preset;

pub fn run_presets(args: PresetsArgs, level: LogLevel) -> Result<(), String> {
    if args.json {
        let presets: Vec<serde_json::Value> = Preset::ALL
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name(),
                    "base": p.base_repo(),
                    "adapter": p.adapter_repo(),
                    "output": p.output_dir(),
                    "params": p.params(),
                })
            })
            .collect();
        let json = serde_json::to_string_pretty(&presets)
            .map_err(|e| format!("Failed to serialize presets: {e}"))?;
        log(level, LogLevel::Normal, &json);
        return Ok(());
    }

    log(level, LogLevel::Normal, "Available presets:");
    for preset in Preset::ALL {
        let params = preset.params();
        log(
            level,
            LogLevel::Normal,
            &format!(
                "  {:<7} dim={} n_heads={} n_layers={} -> {}",
                preset.name(),
                params.dim,
                params.n_heads,
                params.n_layers,
                preset.output_dir().display()
            ),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("          base: {}", preset.base_repo()),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("          adapter: {}", preset.adapter_repo()),
        );
    }
    Ok(())
}
