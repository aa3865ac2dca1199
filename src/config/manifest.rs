//! YAML export manifest
//!
//! ```yaml
//! preset: 7B
//! base: ./llama-7b-hf
//! adapter: ./alpaca-lora-7b
//! output: ./models/7B-alpaca
//! format: pth
//! dtype: f16
//! copy_tokenizer: true
//! ```

use super::cli::ExportArgs;
use crate::checkpoint::Dtype;
use crate::error::{ConsolidateError, Result};
use crate::export::{ExportFormat, ExportPlan};
use crate::presets::Preset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Export settings as written in a manifest; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ExportFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<Dtype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_tokenizer: Option<bool>,
}

impl ExportManifest {
    /// Load a manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConsolidateError::ConfigNotFound { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConsolidateError::io(format!("reading {}", path.display()), e))?;
        Self::from_yaml(&content).map_err(|e| ConsolidateError::ConfigParsing {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse a manifest from YAML text.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Manifest named by `--config` (if any) with the CLI flags applied on top.
    pub fn from_args(args: &ExportArgs) -> Result<Self> {
        let mut manifest = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        apply_overrides(&mut manifest, args);
        Ok(manifest)
    }

    /// Resolve defaults and required fields into an [`ExportPlan`].
    ///
    /// The output directory falls back to the preset's directory.
    pub fn into_plan(self) -> Result<ExportPlan> {
        let preset = self.preset.as_deref().map(str::parse::<Preset>).transpose()?;

        let base = self.base.ok_or_else(|| ConsolidateError::ConfigValue {
            field: "base".into(),
            message: "no base checkpoint given".into(),
            suggestion: "Pass --base DIR or set `base:` in the manifest".into(),
        })?;

        let output_dir = self
            .output
            .or_else(|| preset.map(|p| p.output_dir()))
            .ok_or_else(|| ConsolidateError::ConfigValue {
                field: "output".into(),
                message: "no output directory and no preset to derive one from".into(),
                suggestion: "Pass -o DIR, set `output:` in the manifest, or choose a --preset".into(),
            })?;

        Ok(ExportPlan {
            base,
            adapter: self.adapter,
            output_dir,
            preset,
            format: self.format.unwrap_or_default(),
            dtype: self.dtype.unwrap_or_default(),
            copy_tokenizer: self.copy_tokenizer.unwrap_or(false),
        })
    }
}

/// Apply command-line overrides to a manifest.
pub fn apply_overrides(manifest: &mut ExportManifest, args: &ExportArgs) {
    if let Some(preset) = args.preset {
        manifest.preset = Some(preset.name().to_string());
    }
    if let Some(base) = &args.base {
        manifest.base = Some(base.clone());
    }
    if let Some(adapter) = &args.adapter {
        manifest.adapter = Some(adapter.clone());
    }
    if let Some(output) = &args.output {
        manifest.output = Some(output.clone());
    }
    if let Some(format) = args.format {
        manifest.format = Some(format);
    }
    if let Some(dtype) = args.dtype {
        manifest.dtype = Some(dtype);
    }
    // A bare flag can only switch copying on
    if args.copy_tokenizer {
        manifest.copy_tokenizer = Some(true);
    }
}
