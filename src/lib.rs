//! LoRA adapter consolidation for LLaMA checkpoints
//!
//! Merges a PEFT LoRA adapter into a HuggingFace LLaMA checkpoint and writes
//! the result in the consolidated layout (`consolidated.00.pth` plus
//! `params.json`) expected by the reference inference runtime.
//!
//! ```no_run
//! use lora_consolidate::{ExportManifest, ExportPipeline};
//!
//! let plan = ExportManifest::from_yaml("preset: 7B\nbase: ./llama-7b-hf\nadapter: ./alpaca-lora-7b\n")?
//!     .into_plan()?;
//! let summary = ExportPipeline::new(plan).run()?;
//! println!("{} tensors merged", summary.tensors_merged);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod lora;
pub mod params;
pub mod presets;
pub mod translate;

pub use checkpoint::{Dtype, HfCheckpoint, WeightTensor};
pub use config::ExportManifest;
pub use error::{ConsolidateError, Result};
pub use export::{ExportFormat, ExportPipeline, ExportPlan, ExportSummary};
pub use lora::{LoraAdapter, PeftAdapterConfig};
pub use params::ModelParams;
pub use presets::Preset;
