//! HuggingFace-layout base checkpoint directory.

use super::mapped::SafeTensorsFile;
use crate::error::{ConsolidateError, Result};
use crate::params::HfLlamaConfig;
use std::path::{Path, PathBuf};

/// Weights file inside a HuggingFace model directory.
pub const MODEL_FILE: &str = "model.safetensors";
/// Model config inside a HuggingFace model directory.
pub const CONFIG_FILE: &str = "config.json";
/// SentencePiece tokenizer shipped with LLaMA checkpoints.
pub const TOKENIZER_FILE: &str = "tokenizer.model";

/// A base model checkpoint: single-file weights plus optional config and tokenizer.
#[derive(Debug)]
pub struct HfCheckpoint {
    dir: PathBuf,
    weights: SafeTensorsFile,
    config: Option<HfLlamaConfig>,
    tokenizer: Option<PathBuf>,
}

impl HfCheckpoint {
    /// Open a checkpoint from its directory, or directly from its `.safetensors` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (dir, weights_path) = if path.is_file() {
            let dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            (dir, path.to_path_buf())
        } else if path.is_dir() {
            (path.to_path_buf(), path.join(MODEL_FILE))
        } else {
            return Err(ConsolidateError::ModelNotFound { path: path.to_path_buf() });
        };

        let weights = SafeTensorsFile::open(&weights_path)?;

        let config_path = dir.join(CONFIG_FILE);
        let config = if config_path.is_file() {
            Some(HfLlamaConfig::load(&config_path)?)
        } else {
            None
        };

        let tokenizer = Some(dir.join(TOKENIZER_FILE)).filter(|p| p.is_file());

        Ok(Self { dir, weights, config, tokenizer })
    }

    /// Checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Mapped weights file.
    pub fn weights(&self) -> &SafeTensorsFile {
        &self.weights
    }

    /// Parsed `config.json`, if present.
    pub fn config(&self) -> Option<&HfLlamaConfig> {
        self.config.as_ref()
    }

    /// Path to `tokenizer.model`, if present.
    pub fn tokenizer(&self) -> Option<&Path> {
        self.tokenizer.as_deref()
    }
}
