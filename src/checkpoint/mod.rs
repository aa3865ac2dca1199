//! Checkpoint loading
//!
//! Reads HuggingFace-layout base checkpoints from memory-mapped SafeTensors
//! files and decodes individual tensors to f32 on demand, so a full model is
//! never materialized in f32 at once.

mod dtype;
mod hf;
mod mapped;
mod tensor;

pub use dtype::Dtype;
pub use hf::{HfCheckpoint, CONFIG_FILE, MODEL_FILE, TOKENIZER_FILE};
pub use mapped::{decode_view, SafeTensorsFile};
pub use tensor::WeightTensor;
