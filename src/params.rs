//! Companion hyperparameter file (`params.json`) for consolidated checkpoints.

use crate::error::{ConsolidateError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the hyperparameter file written next to the weights.
pub const PARAMS_FILE: &str = "params.json";

/// Default FFN rounding multiple used by the consolidated runtime.
pub const DEFAULT_MULTIPLE_OF: usize = 256;

/// Hyperparameters in the consolidated runtime's `params.json` layout.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub dim: usize,
    pub multiple_of: usize,
    pub n_heads: usize,
    pub n_layers: usize,
    pub norm_eps: f64,
    /// `-1` lets the runtime take the size from its tokenizer.
    pub vocab_size: i64,
    /// Key/value head count; omitted when every head has its own K/V.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_kv_heads: Option<usize>,
}

/// The subset of a HuggingFace `LlamaConfig` needed to derive [`ModelParams`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HfLlamaConfig {
    pub hidden_size: usize,
    pub num_attention_heads: usize,
    pub num_hidden_layers: usize,
    #[serde(default = "default_rms_norm_eps")]
    pub rms_norm_eps: f64,
    #[serde(default)]
    pub num_key_value_heads: Option<usize>,
    #[serde(default)]
    pub vocab_size: Option<usize>,
    #[serde(default)]
    pub model_type: Option<String>,
}

fn default_rms_norm_eps() -> f64 {
    1e-6
}

impl HfLlamaConfig {
    /// Load `config.json` from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConsolidateError::io(format!("reading {}", path.display()), e))?;
        serde_json::from_str(&content).map_err(|e| ConsolidateError::ConfigParsing {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

impl ModelParams {
    /// Params for a LLaMA checkpoint with the runtime's standard defaults.
    pub fn llama(dim: usize, n_heads: usize, n_layers: usize) -> Self {
        Self {
            dim,
            multiple_of: DEFAULT_MULTIPLE_OF,
            n_heads,
            n_layers,
            norm_eps: 1e-6,
            vocab_size: -1,
            n_kv_heads: None,
        }
    }

    /// Derive params from a HuggingFace model config.
    pub fn from_hf_config(config: &HfLlamaConfig) -> Self {
        let n_kv_heads = config
            .num_key_value_heads
            .filter(|&kv| kv != config.num_attention_heads);
        Self {
            norm_eps: config.rms_norm_eps,
            n_kv_heads,
            ..Self::llama(
                config.hidden_size,
                config.num_attention_heads,
                config.num_hidden_layers,
            )
        }
    }

    /// Per-head dimension.
    pub fn head_dim(&self) -> usize {
        self.dim / self.n_heads
    }

    /// Key/value head count, defaulting to `n_heads`.
    pub fn kv_heads(&self) -> usize {
        self.n_kv_heads.unwrap_or(self.n_heads)
    }

    /// Check the invariants the head permutation relies on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, message: String| ConsolidateError::ConfigValue {
            field: field.into(),
            message,
            suggestion: "Check config.json or the selected preset".into(),
        };

        if self.dim == 0 {
            return Err(invalid("dim", "must be positive".into()));
        }
        if self.n_heads == 0 {
            return Err(invalid("n_heads", "must be positive".into()));
        }
        if self.n_layers == 0 {
            return Err(invalid("n_layers", "must be positive".into()));
        }
        if self.dim % self.n_heads != 0 {
            return Err(invalid(
                "n_heads",
                format!("dim {} is not divisible by n_heads {}", self.dim, self.n_heads),
            ));
        }
        if self.head_dim() % 2 != 0 {
            return Err(invalid(
                "n_heads",
                format!("head dimension {} must be even for rotary layout", self.head_dim()),
            ));
        }
        let kv = self.kv_heads();
        if kv == 0 || self.n_heads % kv != 0 {
            return Err(invalid(
                "n_kv_heads",
                format!("{kv} does not divide n_heads {}", self.n_heads),
            ));
        }
        Ok(())
    }

    /// Ensure the architecture fields agree with another source.
    pub fn check_consistent(&self, other: &ModelParams, source: &str) -> Result<()> {
        let fields = [
            ("dim", self.dim, other.dim),
            ("n_heads", self.n_heads, other.n_heads),
            ("n_layers", self.n_layers, other.n_layers),
            ("n_kv_heads", self.kv_heads(), other.kv_heads()),
        ];
        for (field, mine, theirs) in fields {
            if mine != theirs {
                return Err(ConsolidateError::ConfigValue {
                    field: field.into(),
                    message: format!("preset says {mine} but {source} says {theirs}"),
                    suggestion: "Drop --preset or pick the preset matching the base model".into(),
                });
            }
        }
        Ok(())
    }

    /// Serialize to compact JSON (no spaces after separators).
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ConsolidateError::Serialization { message: e.to_string() })
    }

    /// Write `params.json` into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(PARAMS_FILE);
        std::fs::write(&path, self.to_json()?)
            .map_err(|e| ConsolidateError::io(format!("writing {}", path.display()), e))?;
        Ok(path)
    }
}
