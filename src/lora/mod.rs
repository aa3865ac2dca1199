//! LoRA (Low-Rank Adaptation) adapters
//!
//! Loads PEFT-format adapters and folds their low-rank updates back into
//! frozen base weights: for a base weight W ∈ ℝ^(d_out × d_in) the adapter
//! contributes ΔW = scale · B @ A with A ∈ ℝ^(r × d_in), B ∈ ℝ^(d_out × r).

mod loader;
mod merge;
mod peft_config;

pub use loader::{LoraAdapter, LoraPair, ADAPTER_CONFIG_FILE, ADAPTER_WEIGHTS_FILE};
pub use merge::merge_into;
pub use peft_config::{PeftAdapterConfig, TargetModules};
