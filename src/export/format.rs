//! Output format selection.

use super::pth::PthWriter;
use super::safetensors_writer::SafeTensorsWriter;
use super::writer::CheckpointWriter;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Consolidated checkpoint container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PyTorch zip archive loadable with `torch.load`
    #[default]
    #[serde(alias = "pth", alias = "torch")]
    PyTorch,
    /// SafeTensors with consolidated key names
    #[serde(alias = "st")]
    SafeTensors,
}

impl ExportFormat {
    /// Weights file name inside the output directory.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::PyTorch => "consolidated.00.pth",
            Self::SafeTensors => "consolidated.safetensors",
        }
    }

    /// Check if format is safe to load (no pickle)
    #[must_use]
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::SafeTensors)
    }

    /// Open a writer for this format at `path`.
    ///
    /// `archive_name` is the record prefix inside PyTorch archives.
    pub fn create_writer(&self, path: &Path, archive_name: &str) -> Result<Box<dyn CheckpointWriter>> {
        Ok(match self {
            Self::PyTorch => Box::new(PthWriter::create(path, archive_name)?),
            Self::SafeTensors => Box::new(SafeTensorsWriter::new(path)),
        })
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pth" | "pytorch" | "torch" | "pt" => Ok(Self::PyTorch),
            "safetensors" | "st" => Ok(Self::SafeTensors),
            _ => Err(format!("Unknown format: {s}. Use: pth, safetensors")),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PyTorch => write!(f, "PyTorch"),
            Self::SafeTensors => write!(f, "SafeTensors"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!("pth".parse::<ExportFormat>().unwrap(), ExportFormat::PyTorch);
        assert_eq!("PyTorch".parse::<ExportFormat>().unwrap(), ExportFormat::PyTorch);
        assert_eq!("ST".parse::<ExportFormat>().unwrap(), ExportFormat::SafeTensors);
        assert!("gguf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(ExportFormat::PyTorch.file_name(), "consolidated.00.pth");
        assert_eq!(ExportFormat::SafeTensors.file_name(), "consolidated.safetensors");
    }

    #[test]
    fn test_default_is_pytorch() {
        assert_eq!(ExportFormat::default(), ExportFormat::PyTorch);
        assert!(!ExportFormat::PyTorch.is_safe());
        assert!(ExportFormat::SafeTensors.is_safe());
    }

    #[test]
    fn test_serde_aliases() {
        let f: ExportFormat = serde_yaml::from_str("pth").unwrap();
        assert_eq!(f, ExportFormat::PyTorch);
        let f: ExportFormat = serde_yaml::from_str("safetensors").unwrap();
        assert_eq!(f, ExportFormat::SafeTensors);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExportFormat::SafeTensors.to_string(), "SafeTensors");
    }
}
