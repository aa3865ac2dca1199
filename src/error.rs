//! Error types with actionable diagnostics.
//!
//! Every variant carries enough context (path, tensor name, field) to fix the
//! problem without re-running in verbose mode.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConsolidateError>;

/// Errors raised while loading, merging, translating, or writing a checkpoint.
#[derive(Error, Debug)]
pub enum ConsolidateError {
    /// Configuration manifest not found.
    #[error("Configuration file not found: {path}\n  → Check the --config path")]
    ConfigNotFound { path: PathBuf },

    /// Configuration manifest or model config has invalid syntax.
    #[error("Invalid configuration syntax in {path}:\n  {message}\n  → Check YAML/JSON syntax at the indicated line")]
    ConfigParsing { path: PathBuf, message: String },

    /// A configuration value or CLI argument is invalid.
    #[error("Invalid value for '{field}': {message}\n  → {suggestion}")]
    ConfigValue { field: String, message: String, suggestion: String },

    /// Unknown conversion preset name.
    #[error("Unknown preset: {name}\n  → Valid presets: {valid}")]
    UnknownPreset { name: String, valid: String },

    /// Base checkpoint or adapter file missing.
    #[error("Model file not found: {path}\n  → Point --base/--adapter at a directory holding the HuggingFace/PEFT files")]
    ModelNotFound { path: PathBuf },

    /// A state-dict key with no entry in the translation table.
    #[error("Unrecognized state dict key: {key}\n  → Only LLaMA-family checkpoints are supported")]
    UnknownKey { key: String },

    /// Stored tensor dtype that cannot be converted.
    #[error("Unsupported dtype {dtype} for tensor '{name}'\n  → Supported dtypes: F32, F16, BF16")]
    UnsupportedDtype { name: String, dtype: String },

    /// Tensor shape does not match what the operation requires.
    #[error("Tensor shape mismatch for '{name}': expected {expected:?}, got {actual:?}\n  → Check that the adapter was trained on this base model")]
    ShapeMismatch { name: String, expected: Vec<usize>, actual: Vec<usize> },

    /// Adapter contents are inconsistent with its config or the base model.
    #[error("Adapter error: {message}")]
    Adapter { message: String },

    /// SafeTensors parse or serialization failure.
    #[error("SafeTensors error in {context}: {message}")]
    SafeTensors { context: String, message: String },

    /// PyTorch archive write failure.
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON/YAML serialization failure.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ConsolidateError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Create a SafeTensors error with context.
    pub fn safetensors(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::SafeTensors { context: context.into(), message: err.to_string() }
    }

    /// Create an adapter error.
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter { message: message.into() }
    }

    /// Check if this error is caused by user input rather than a bad file.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParsing { .. }
                | Self::ConfigValue { .. }
                | Self::UnknownPreset { .. }
                | Self::ModelNotFound { .. }
        )
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigNotFound { .. } => "E001",
            Self::ConfigParsing { .. } => "E002",
            Self::ConfigValue { .. } => "E003",
            Self::UnknownPreset { .. } => "E004",
            Self::ModelNotFound { .. } => "E010",
            Self::UnknownKey { .. } => "E020",
            Self::UnsupportedDtype { .. } => "E021",
            Self::ShapeMismatch { .. } => "E040",
            Self::Adapter { .. } => "E041",
            Self::SafeTensors { .. } => "E050",
            Self::Archive { .. } => "E051",
            Self::Io { .. } => "E052",
            Self::Serialization { .. } => "E053",
        }
    }
}

impl From<zip::result::ZipError> for ConsolidateError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive { message: err.to_string() }
    }
}
