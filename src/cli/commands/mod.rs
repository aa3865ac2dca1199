//! CLI command implementations

mod export;
mod plan;
mod presets;


use crate::cli::LogLevel;
use crate::config::{Cli, Command};
use crate::error::ConsolidateError;
use crate::export::TensorPlan;
use crate::translate::ReshapeKind;

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.quiet, cli.verbose);

    match cli.command {
        Command::Export(args) => export::run_export(args, log_level),
        Command::Plan(args) => plan::run_plan(args, log_level),
        Command::Presets(args) => presets::run_presets(args, log_level),
    }
}

/// Render an error with its code for the terminal.
fn describe(err: ConsolidateError) -> String {
    format!("[{}] {err}", err.code())
}

/// One line per tensor: source, target, shape, and what happens to it.
fn describe_tensor(plan: &TensorPlan) -> String {
    let Some(target) = &plan.target else {
        return format!("  {} (skipped)", plan.source);
    };

    let mut notes = Vec::new();
    if plan.merged {
        notes.push("merged");
    }
    if plan.reshape != ReshapeKind::None {
        notes.push("unpermuted");
    }
    let notes = if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join(", "))
    };

    format!("  {} -> {target} {:?} {}{notes}", plan.source, plan.shape, plan.stored_dtype)
}

fn format_bytes(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= GIB {
        format!("{:.2} GiB", bytes / GIB)
    } else {
        format!("{:.2} MiB", bytes / MIB)
    }
}
