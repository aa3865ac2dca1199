//! Memory-mapped SafeTensors files.

use super::dtype::Dtype;
use super::tensor::WeightTensor;
use crate::error::{ConsolidateError, Result};
use safetensors::tensor::TensorView;
use safetensors::SafeTensors;
use std::path::{Path, PathBuf};

/// A SafeTensors file mapped read-only into memory.
///
/// Parsing borrows the mapping, so tensor data is only paged in when a
/// tensor is decoded.
#[derive(Debug)]
pub struct SafeTensorsFile {
    path: PathBuf,
    mmap: memmap2::Mmap,
}

impl SafeTensorsFile {
    /// Map a SafeTensors file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ConsolidateError::ModelNotFound { path });
        }

        let file = std::fs::File::open(&path)
            .map_err(|e| ConsolidateError::io(format!("opening {}", path.display()), e))?;
        let len = file
            .metadata()
            .map_err(|e| ConsolidateError::io(format!("reading {}", path.display()), e))?
            .len();
        if len < 8 {
            return Err(ConsolidateError::safetensors(
                path.display().to_string(),
                format!("file too small: {len} bytes (minimum 8 for header)"),
            ));
        }

        // SAFETY: the file is opened read-only and not modified while mapped
        let mmap = unsafe {
            memmap2::MmapOptions::new()
                .map(&file)
                .map_err(|e| ConsolidateError::io(format!("mapping {}", path.display()), e))?
        };

        Ok(Self { path, mmap })
    }

    /// Path of the mapped file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Parse the header, borrowing the mapped bytes.
    pub fn parse(&self) -> Result<SafeTensors<'_>> {
        SafeTensors::deserialize(&self.mmap)
            .map_err(|e| ConsolidateError::safetensors(self.path.display().to_string(), e))
    }
}

/// Decode one tensor view to f32.
pub fn decode_view(name: &str, view: &TensorView<'_>) -> Result<WeightTensor> {
    let dtype = Dtype::from_safetensors(view.dtype(), name)?;
    WeightTensor::new(name, dtype.decode(view.data()), view.shape().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write_file(dir: &Path, tensors: &[(&str, Dtype, Vec<usize>, Vec<f32>)]) -> PathBuf {
        let encoded: Vec<(String, Dtype, Vec<usize>, Vec<u8>)> = tensors
            .iter()
            .map(|(n, d, s, v)| ((*n).to_string(), *d, s.clone(), d.encode(v)))
            .collect();
        let views: Vec<(&str, TensorView<'_>)> = encoded
            .iter()
            .map(|(n, d, s, b)| {
                (n.as_str(), TensorView::new(d.to_safetensors(), s.clone(), b).unwrap())
            })
            .collect();
        let bytes = safetensors::serialize(views, None::<HashMap<String, String>>).unwrap();
        let path = dir.join("model.safetensors");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_open_and_decode() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            &[
                ("a", Dtype::F32, vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]),
                ("b", Dtype::F16, vec![3], vec![0.5, -1.0, 2.0]),
            ],
        );

        let file = SafeTensorsFile::open(&path).unwrap();
        assert!(file.size_bytes() > 8);
        let st = file.parse().unwrap();
        assert_eq!(st.len(), 2);

        let a = decode_view("a", &st.tensor("a").unwrap()).unwrap();
        assert_eq!(a.shape, vec![2, 2]);
        assert_eq!(a.data, vec![1.0, 2.0, 3.0, 4.0]);

        let b = decode_view("b", &st.tensor("b").unwrap()).unwrap();
        assert_eq!(b.data, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_missing_file_is_model_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = SafeTensorsFile::open(tmp.path().join("nope.safetensors")).unwrap_err();
        assert!(matches!(err, ConsolidateError::ModelNotFound { .. }));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiny.safetensors");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let err = SafeTensorsFile::open(&path).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_garbage_header_rejected_on_parse() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.safetensors");
        std::fs::write(&path, [0xFFu8; 64]).unwrap();
        let file = SafeTensorsFile::open(&path).unwrap();
        assert!(matches!(file.parse(), Err(ConsolidateError::SafeTensors { .. })));
    }
}
