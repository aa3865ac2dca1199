//! PyTorch zip checkpoint writer (`torch.save` serialization format 3)
//!
//! Layout, all records stored uncompressed under `<archive>/`:
//! - `data/<n>`: raw little-endian storage bytes, one record per tensor
//! - `data.pkl`: pickled `dict[str, Tensor]` referencing storages by key
//! - `byteorder`, `version`

use super::pickle::{Pickler, StorageRef};
use super::writer::CheckpointWriter;
use crate::checkpoint::Dtype;
use crate::error::{ConsolidateError, Result};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Record alignment torch uses so storages can be memory-mapped.
const RECORD_ALIGNMENT: u16 = 64;

/// Serialization format version understood by `torch.load`.
const FORMAT_VERSION: &str = "3\n";

struct PthEntry {
    name: String,
    dtype: Dtype,
    shape: Vec<usize>,
    numel: usize,
}

/// Streams tensors into a PyTorch archive; the pickle is written on finish.
pub struct PthWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    archive_name: String,
    entries: Vec<PthEntry>,
}

impl PthWriter<BufWriter<File>> {
    /// Create an archive file at `path`.
    pub fn create(path: &Path, archive_name: &str) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| ConsolidateError::io(format!("creating {}", path.display()), e))?;
        Ok(Self::new(BufWriter::new(file), archive_name))
    }
}

impl<W: Write + Seek> PthWriter<W> {
    /// Write an archive into any seekable sink.
    pub fn new(inner: W, archive_name: &str) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            archive_name: archive_name.to_string(),
            entries: Vec::new(),
        }
    }

    fn options(len: usize) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .with_alignment(RECORD_ALIGNMENT)
            .large_file(len as u64 >= u64::from(u32::MAX))
    }

    fn write_record(&mut self, record: &str, bytes: &[u8]) -> Result<()> {
        let path = format!("{}/{record}", self.archive_name);
        self.zip.start_file(path, Self::options(bytes.len()))?;
        self.zip
            .write_all(bytes)
            .map_err(|e| ConsolidateError::io(format!("writing record {record}"), e))
    }

    fn pickle(&self) -> Vec<u8> {
        let mut p = Pickler::new();
        p.empty_dict();
        if !self.entries.is_empty() {
            p.mark();
            for (key, entry) in self.entries.iter().enumerate() {
                p.string(&entry.name);
                let key = key.to_string();
                let storage = StorageRef {
                    storage_type: entry.dtype.torch_storage(),
                    key: &key,
                    numel: entry.numel,
                };
                p.tensor(&storage, &entry.shape);
            }
            p.set_items();
        }
        p.finish()
    }

    /// Finish the archive and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        let pickle = self.pickle();
        self.write_record("data.pkl", &pickle)?;
        self.write_record("byteorder", b"little")?;
        self.write_record("version", FORMAT_VERSION.as_bytes())?;
        Ok(self.zip.finish()?)
    }
}

impl<W: Write + Seek> CheckpointWriter for PthWriter<W> {
    fn write_tensor(&mut self, name: &str, dtype: Dtype, shape: &[usize], bytes: &[u8]) -> Result<()> {
        let numel: usize = shape.iter().product();
        if bytes.len() != numel * dtype.size_of() {
            return Err(ConsolidateError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![numel * dtype.size_of()],
                actual: vec![bytes.len()],
            });
        }

        let key = self.entries.len();
        self.write_record(&format!("data/{key}"), bytes)?;
        self.entries.push(PthEntry {
            name: name.to_string(),
            dtype,
            shape: shape.to_vec(),
            numel,
        });
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let mut inner = self.into_inner()?;
        inner
            .flush()
            .map_err(|e| ConsolidateError::io("flushing checkpoint archive", e))
    }
}
