//! Named conversion presets for the published Alpaca-style LoRA adapters.

use crate::error::ConsolidateError;
use crate::params::ModelParams;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A known base model / adapter pairing with fixed hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// LLaMA-7B + alpaca-lora-7b
    Llama7B,
    /// LLaMA-13B + alpaca13B-lora
    Llama13B,
    /// LLaMA-13B + KoAlpaca-13B-LoRA
    Llama13BKo,
}

impl Preset {
    /// All presets in display order.
    pub const ALL: [Preset; 3] = [Preset::Llama7B, Preset::Llama13B, Preset::Llama13BKo];

    /// CLI name of the preset.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Llama7B => "7B",
            Self::Llama13B => "13B",
            Self::Llama13BKo => "13B-ko",
        }
    }

    /// Hyperparameters written to `params.json`.
    pub fn params(&self) -> ModelParams {
        match self {
            Self::Llama7B => ModelParams::llama(4096, 32, 32),
            Self::Llama13B | Self::Llama13BKo => ModelParams::llama(5120, 40, 40),
        }
    }

    /// HuggingFace repository the base checkpoint comes from.
    pub fn base_repo(&self) -> &'static str {
        match self {
            Self::Llama7B => "decapoda-research/llama-7b-hf",
            Self::Llama13B | Self::Llama13BKo => "decapoda-research/llama-13b-hf",
        }
    }

    /// HuggingFace repository the adapter comes from.
    pub fn adapter_repo(&self) -> &'static str {
        match self {
            Self::Llama7B => "tloen/alpaca-lora-7b",
            Self::Llama13B => "samwit/alpaca13B-lora",
            Self::Llama13BKo => "beomi/KoAlpaca-13B-LoRA",
        }
    }

    /// Default output directory, relative to the working directory.
    pub fn output_dir(&self) -> PathBuf {
        match self {
            Self::Llama7B => PathBuf::from("models/7B-alpaca"),
            Self::Llama13B => PathBuf::from("models/13B-alpaca"),
            Self::Llama13BKo => PathBuf::from("models/13B-ko"),
        }
    }

    /// Comma-separated list of valid names, for diagnostics.
    pub fn valid_names() -> String {
        Self::ALL.iter().map(Preset::name).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for Preset {
    type Err = ConsolidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConsolidateError::UnknownPreset {
                name: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("7B".parse::<Preset>().unwrap(), Preset::Llama7B);
        assert_eq!("13b".parse::<Preset>().unwrap(), Preset::Llama13B);
        assert_eq!("13B-KO".parse::<Preset>().unwrap(), Preset::Llama13BKo);
    }

    #[test]
    fn test_unknown_preset_is_user_error() {
        let err = "30B".parse::<Preset>().unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("7B, 13B, 13B-ko"));
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
        }
    }

    #[test]
    fn test_params_are_valid() {
        for preset in Preset::ALL {
            preset.params().validate().unwrap();
        }
        let p7 = Preset::Llama7B.params();
        assert_eq!((p7.dim, p7.n_heads, p7.n_layers), (4096, 32, 32));
        let p13 = Preset::Llama13BKo.params();
        assert_eq!((p13.dim, p13.n_heads, p13.n_layers), (5120, 40, 40));
        assert_eq!(p13.multiple_of, 256);
    }

    #[test]
    fn test_output_dirs_are_distinct() {
        let dirs: std::collections::HashSet<_> =
            Preset::ALL.iter().map(Preset::output_dir).collect();
        assert_eq!(dirs.len(), 3);
        assert_eq!(Preset::Llama13BKo.output_dir(), PathBuf::from("models/13B-ko"));
    }

    #[test]
    fn test_13b_variants_share_base() {
        assert_eq!(Preset::Llama13B.base_repo(), Preset::Llama13BKo.base_repo());
        assert_ne!(Preset::Llama13B.adapter_repo(), Preset::Llama13BKo.adapter_repo());
    }
}
