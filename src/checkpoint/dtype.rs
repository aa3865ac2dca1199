//! Element types supported for loading and export.

use crate::error::{ConsolidateError, Result};
use half::{bf16, f16};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Floating-point storage type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    F32,
    #[default]
    F16,
    BF16,
}

impl Dtype {
    /// Bytes per element.
    pub fn size_of(&self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F16 | Self::BF16 => 2,
        }
    }

    /// Map a SafeTensors dtype, naming the tensor on failure.
    pub fn from_safetensors(dtype: safetensors::Dtype, name: &str) -> Result<Self> {
        match dtype {
            safetensors::Dtype::F32 => Ok(Self::F32),
            safetensors::Dtype::F16 => Ok(Self::F16),
            safetensors::Dtype::BF16 => Ok(Self::BF16),
            other => Err(ConsolidateError::UnsupportedDtype {
                name: name.to_string(),
                dtype: format!("{other:?}"),
            }),
        }
    }

    /// Equivalent SafeTensors dtype.
    pub fn to_safetensors(self) -> safetensors::Dtype {
        match self {
            Self::F32 => safetensors::Dtype::F32,
            Self::F16 => safetensors::Dtype::F16,
            Self::BF16 => safetensors::Dtype::BF16,
        }
    }

    /// Storage class name used by PyTorch's pickled tensors.
    pub fn torch_storage(&self) -> &'static str {
        match self {
            Self::F32 => "FloatStorage",
            Self::F16 => "HalfStorage",
            Self::BF16 => "BFloat16Storage",
        }
    }

    /// Decode little-endian bytes into f32 values.
    pub fn decode(&self, bytes: &[u8]) -> Vec<f32> {
        match self {
            Self::F32 => bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            Self::F16 => bytes
                .chunks_exact(2)
                .map(|c| f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
                .collect(),
            Self::BF16 => bytes
                .chunks_exact(2)
                .map(|c| bf16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
                .collect(),
        }
    }

    /// Encode f32 values as little-endian bytes of this dtype.
    pub fn encode(&self, values: &[f32]) -> Vec<u8> {
        match self {
            // Little-endian hosts only; safetensors and torch archives are LE
            Self::F32 => bytemuck::cast_slice(values).to_vec(),
            Self::F16 => values
                .iter()
                .flat_map(|&v| f16::from_f32(v).to_bits().to_le_bytes())
                .collect(),
            Self::BF16 => values
                .iter()
                .flat_map(|&v| bf16::from_f32(v).to_bits().to_le_bytes())
                .collect(),
        }
    }
}

impl FromStr for Dtype {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f32" | "float32" | "float" => Ok(Self::F32),
            "f16" | "float16" | "half" => Ok(Self::F16),
            "bf16" | "bfloat16" => Ok(Self::BF16),
            _ => Err(format!("Unknown dtype: {s}. Valid dtypes: f16, bf16, f32")),
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::F32 => write!(f, "f32"),
            Self::F16 => write!(f, "f16"),
            Self::BF16 => write!(f, "bf16"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("F16".parse::<Dtype>().unwrap(), Dtype::F16);
        assert_eq!("half".parse::<Dtype>().unwrap(), Dtype::F16);
        assert_eq!("bfloat16".parse::<Dtype>().unwrap(), Dtype::BF16);
        assert_eq!("float32".parse::<Dtype>().unwrap(), Dtype::F32);
        assert!("int8".parse::<Dtype>().is_err());
    }

    #[test]
    fn test_default_is_half() {
        assert_eq!(Dtype::default(), Dtype::F16);
    }

    #[test]
    fn test_encode_length_matches_size_of() {
        let values = [1.0f32, -2.5, 0.125];
        for dtype in [Dtype::F32, Dtype::F16, Dtype::BF16] {
            assert_eq!(dtype.encode(&values).len(), values.len() * dtype.size_of());
        }
    }

    #[test]
    fn test_f16_decode_known_bits() {
        // 0x3C00 = 1.0, 0xC000 = -2.0 in IEEE half
        let bytes = [0x00, 0x3C, 0x00, 0xC0];
        assert_eq!(Dtype::F16.decode(&bytes), vec![1.0, -2.0]);
    }

    #[test]
    fn test_bf16_decode_known_bits() {
        // 0x3F80 = 1.0 in bfloat16
        assert_eq!(Dtype::BF16.decode(&[0x80, 0x3F]), vec![1.0]);
    }

    #[test]
    fn test_half_encoding_rounds() {
        let decoded = Dtype::F16.decode(&Dtype::F16.encode(&[0.1]));
        assert!((decoded[0] - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_safetensors_mapping() {
        for dtype in [Dtype::F32, Dtype::F16, Dtype::BF16] {
            assert_eq!(Dtype::from_safetensors(dtype.to_safetensors(), "t").unwrap(), dtype);
        }
        let err = Dtype::from_safetensors(safetensors::Dtype::I64, "position_ids").unwrap_err();
        assert!(err.to_string().contains("position_ids"));
    }

    #[test]
    fn test_torch_storage_names() {
        assert_eq!(Dtype::F16.torch_storage(), "HalfStorage");
        assert_eq!(Dtype::F32.torch_storage(), "FloatStorage");
        assert_eq!(Dtype::BF16.torch_storage(), "BFloat16Storage");
    }
}
