//! PEFT `adapter_config.json` parsing
//!
//! Mirrors the HuggingFace PEFT `LoraConfig` schema closely enough to read
//! adapters saved by `peft.PeftModel.save_pretrained()`.

use crate::error::{ConsolidateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Target modules: PEFT accepts either a list of names or a single regex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TargetModules {
    List(Vec<String>),
    Pattern(String),
}

impl Default for TargetModules {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// PEFT adapter configuration matching the HuggingFace PEFT schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeftAdapterConfig {
    /// PEFT method type (must be "LORA")
    pub peft_type: String,
    /// LoRA rank
    pub r: usize,
    /// LoRA alpha scaling parameter
    pub lora_alpha: f32,
    /// Target module names for LoRA adaptation
    #[serde(default)]
    pub target_modules: TargetModules,
    /// LoRA dropout rate (unused at merge time)
    #[serde(default)]
    pub lora_dropout: f32,
    /// Bias handling: "none", "all", or "lora_only"
    #[serde(default = "default_bias")]
    pub bias: String,
    /// Base model name or path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model_name_or_path: Option<String>,
    /// Task type (e.g., "CAUSAL_LM")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Base layer stores weights as (d_in, d_out)
    #[serde(default)]
    pub fan_in_fan_out: bool,
    /// Inference mode
    #[serde(default)]
    pub inference_mode: bool,
    /// Rank-stabilized scaling (alpha / sqrt(r))
    #[serde(default)]
    pub use_rslora: bool,
}

fn default_bias() -> String {
    "none".to_string()
}

impl PeftAdapterConfig {
    /// Minimal LoRA config with the given rank and alpha.
    pub fn new(r: usize, lora_alpha: f32) -> Self {
        Self {
            peft_type: "LORA".to_string(),
            r,
            lora_alpha,
            target_modules: TargetModules::default(),
            lora_dropout: 0.0,
            bias: default_bias(),
            base_model_name_or_path: None,
            task_type: None,
            fan_in_fan_out: false,
            inference_mode: false,
            use_rslora: false,
        }
    }

    /// Set target modules
    pub fn with_target_modules(mut self, modules: &[&str]) -> Self {
        self.target_modules = TargetModules::List(modules.iter().map(|m| (*m).to_string()).collect());
        self
    }

    /// Load and validate `adapter_config.json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConsolidateError::ModelNotFound { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConsolidateError::io(format!("reading {}", path.display()), e))?;
        let config = Self::from_json(&content).map_err(|e| ConsolidateError::ConfigParsing {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the adapter can be merged.
    pub fn validate(&self) -> Result<()> {
        if !self.peft_type.eq_ignore_ascii_case("LORA") {
            return Err(ConsolidateError::adapter(format!(
                "peft_type is {}, only LORA adapters can be merged",
                self.peft_type
            )));
        }
        if self.r == 0 {
            return Err(ConsolidateError::adapter("rank r must be positive"));
        }
        if self.bias != "none" {
            return Err(ConsolidateError::adapter(format!(
                "bias mode '{}' is not supported, only 'none'",
                self.bias
            )));
        }
        Ok(())
    }

    /// Scaling applied to B @ A when merging.
    pub fn scale(&self) -> f32 {
        if self.use_rslora {
            self.lora_alpha / (self.r as f32).sqrt()
        } else {
            self.lora_alpha / self.r as f32
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
