//! Command-line arguments and YAML export manifests
//!
//! # Usage
//!
//! ```bash
//! lora-consolidate export --preset 7B --base ./llama-7b-hf --adapter ./alpaca-lora-7b
//! lora-consolidate export --config export.yaml --dtype bf16
//! lora-consolidate plan --base ./llama-7b-hf --adapter ./alpaca-lora-7b
//! lora-consolidate presets
//! ```

mod cli;
mod manifest;

pub use cli::{Cli, Command, ExportArgs, PresetsArgs};
pub use manifest::{apply_overrides, ExportManifest};
