//! CLI entry points

mod commands;
pub mod logging;

pub use commands::run_command;
pub use logging::LogLevel;

pub use crate::config::{Cli, Command};
