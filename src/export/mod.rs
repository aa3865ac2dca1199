//! Consolidated checkpoint export
//!
//! Streams base tensors through adapter merge and key translation into a
//! PyTorch archive or SafeTensors file, then writes `params.json`.

mod format;
mod pickle;
mod pipeline;
mod pth;
mod safetensors_writer;
mod writer;

pub use format::ExportFormat;
pub use pipeline::{resolve_params, ExportPipeline, ExportPlan, ExportSummary, TensorPlan};
pub use pth::PthWriter;
pub use safetensors_writer::SafeTensorsWriter;
pub use writer::CheckpointWriter;
