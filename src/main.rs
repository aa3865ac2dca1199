//! lora-consolidate CLI
//!
//! # Usage
//!
//! ```bash
//! # Merge a published adapter with its preset
//! lora-consolidate export --preset 7B --base ./llama-7b-hf --adapter ./alpaca-lora-7b
//!
//! # Export from a manifest, overriding the dtype
//! lora-consolidate export --config export.yaml --dtype bf16
//!
//! # Show the key mapping without writing
//! lora-consolidate plan --base ./llama-7b-hf --adapter ./alpaca-lora-7b -o out
//! ```

use clap::Parser;
use lora_consolidate::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
