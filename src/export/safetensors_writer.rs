//! SafeTensors writer for consolidated checkpoints.

use super::writer::CheckpointWriter;
use crate::checkpoint::Dtype;
use crate::error::{ConsolidateError, Result};
use safetensors::tensor::TensorView;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Buffers encoded tensors; SafeTensors needs the full header before any data.
pub struct SafeTensorsWriter {
    path: PathBuf,
    tensors: Vec<(String, Dtype, Vec<usize>, Vec<u8>)>,
}

impl SafeTensorsWriter {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), tensors: Vec::new() }
    }
}

impl CheckpointWriter for SafeTensorsWriter {
    fn write_tensor(&mut self, name: &str, dtype: Dtype, shape: &[usize], bytes: &[u8]) -> Result<()> {
        self.tensors.push((name.to_string(), dtype, shape.to_vec(), bytes.to_vec()));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let views: Vec<(&str, TensorView<'_>)> = self
            .tensors
            .iter()
            .map(|(name, dtype, shape, bytes)| {
                TensorView::new(dtype.to_safetensors(), shape.clone(), bytes)
                    .map(|view| (name.as_str(), view))
                    .map_err(|e| ConsolidateError::safetensors(name.clone(), e))
            })
            .collect::<Result<_>>()?;

        let mut metadata = HashMap::new();
        metadata.insert("format".to_string(), "pt".to_string());

        let bytes = safetensors::serialize(views, Some(metadata))
            .map_err(|e| ConsolidateError::safetensors(self.path.display().to_string(), e))?;

        std::fs::write(&self.path, bytes)
            .map_err(|e| ConsolidateError::io(format!("writing {}", self.path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("consolidated.safetensors");

        let mut writer: Box<dyn CheckpointWriter> = Box::new(SafeTensorsWriter::new(&path));
        writer
            .write_tensor("norm.weight", Dtype::F16, &[2], &Dtype::F16.encode(&[1.0, 0.5]))
            .unwrap();
        writer
            .write_tensor("output.weight", Dtype::F32, &[1, 2], &Dtype::F32.encode(&[3.0, 4.0]))
            .unwrap();
        writer.finish().unwrap();

        let data = std::fs::read(&path).unwrap();
        let st = safetensors::SafeTensors::deserialize(&data).unwrap();
        assert_eq!(st.len(), 2);

        let norm = st.tensor("norm.weight").unwrap();
        assert_eq!(norm.dtype(), safetensors::Dtype::F16);
        assert_eq!(Dtype::F16.decode(norm.data()), vec![1.0, 0.5]);

        let (_, meta) = safetensors::SafeTensors::read_metadata(&data).unwrap();
        assert_eq!(meta.metadata().as_ref().unwrap().get("format").unwrap(), "pt");
    }

    #[test]
    fn test_bad_length_rejected_on_finish() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.safetensors");
        let mut writer: Box<dyn CheckpointWriter> = Box::new(SafeTensorsWriter::new(&path));
        writer.write_tensor("w", Dtype::F32, &[4], &[0u8; 3]).unwrap();
        assert!(writer.finish().is_err());
        assert!(!path.exists());
    }
}
