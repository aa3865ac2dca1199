//! Core CLI types - Cli, Command, and argument structs

use crate::checkpoint::Dtype;
use crate::export::ExportFormat;
use crate::presets::Preset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lora-consolidate: LoRA merge and consolidated checkpoint export
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "lora-consolidate")]
#[command(author = "PAIML")]
#[command(version)]
#[command(
    about = "Merge a PEFT LoRA adapter into a HuggingFace LLaMA checkpoint and export consolidated weights"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Merge the adapter and write consolidated weights plus params.json
    Export(ExportArgs),

    /// Show how every tensor would be translated, without writing anything
    Plan(ExportArgs),

    /// List the built-in model presets
    Presets(PresetsArgs),
}

/// Arguments shared by the export and plan commands
///
/// Every field overrides the matching key of the `--config` manifest.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct ExportArgs {
    /// YAML export manifest
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// HuggingFace base checkpoint directory
    #[arg(long, value_name = "DIR")]
    pub base: Option<PathBuf>,

    /// PEFT adapter directory (omit to convert the base model alone)
    #[arg(long, value_name = "DIR")]
    pub adapter: Option<PathBuf>,

    /// Model preset (7B, 13B, 13B-ko)
    #[arg(short, long)]
    pub preset: Option<Preset>,

    /// Output directory (defaults to the preset's directory)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Output format (pth, safetensors)
    #[arg(short, long)]
    pub format: Option<ExportFormat>,

    /// Output dtype (f16, bf16, f32)
    #[arg(short, long)]
    pub dtype: Option<Dtype>,

    /// Copy tokenizer.model next to the output directory
    #[arg(long)]
    pub copy_tokenizer: bool,
}

/// Arguments for the presets command
#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct PresetsArgs {
    /// Print presets as JSON
    #[arg(long)]
    pub json: bool,
}
