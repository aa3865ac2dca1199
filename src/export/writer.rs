//! Checkpoint writer seam shared by the output formats.

use crate::checkpoint::Dtype;
use crate::error::Result;

/// Sink for translated tensors.
///
/// Tensors arrive already encoded in `dtype`, row-major and contiguous.
pub trait CheckpointWriter {
    /// Append one tensor.
    fn write_tensor(&mut self, name: &str, dtype: Dtype, shape: &[usize], bytes: &[u8]) -> Result<()>;

    /// Flush everything and close the file.
    fn finish(self: Box<Self>) -> Result<()>;
}
