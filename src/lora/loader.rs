//! PEFT adapter directory loading

use super::peft_config::PeftAdapterConfig;
use crate::checkpoint::{decode_view, SafeTensorsFile, WeightTensor};
use crate::error::{ConsolidateError, Result};
use crate::translate::strip_peft_prefix;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Adapter config inside a PEFT adapter directory.
pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
/// Adapter weights inside a PEFT adapter directory.
pub const ADAPTER_WEIGHTS_FILE: &str = "adapter_model.safetensors";

/// Low-rank factors for one adapted linear layer.
#[derive(Debug, Clone)]
pub struct LoraPair {
    /// Down-projection A, shape `[r, d_in]`
    pub a: WeightTensor,
    /// Up-projection B, shape `[d_out, r]`
    pub b: WeightTensor,
}

/// A loaded PEFT LoRA adapter, keyed by the base weight each pair updates.
#[derive(Debug)]
pub struct LoraAdapter {
    dir: PathBuf,
    config: PeftAdapterConfig,
    pairs: BTreeMap<String, LoraPair>,
}

#[derive(Default)]
struct PartialPair {
    a: Option<WeightTensor>,
    b: Option<WeightTensor>,
}

/// Low-rank factor held by one adapter tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Factor {
    A,
    B,
}

/// Which factor an adapter tensor holds, and the base weight key it targets.
fn parse_adapter_key(key: &str) -> Option<(Factor, String)> {
    for (marker, which) in [(".lora_A.", Factor::A), (".lora_B.", Factor::B)] {
        if let Some(pos) = key.find(marker) {
            let rest = &key[pos + marker.len()..];
            // "weight" or "<adapter_name>.weight"
            if rest == "weight" || rest.ends_with(".weight") {
                let module = strip_peft_prefix(&key[..pos]);
                return Some((which, format!("{module}.weight")));
            }
        }
    }
    None
}

impl LoraAdapter {
    /// Load `adapter_config.json` and `adapter_model.safetensors` from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ConsolidateError::ModelNotFound { path: dir.to_path_buf() });
        }
        let config = PeftAdapterConfig::load(dir.join(ADAPTER_CONFIG_FILE))?;

        let file = SafeTensorsFile::open(dir.join(ADAPTER_WEIGHTS_FILE))?;
        let st = file.parse()?;

        let mut partial: BTreeMap<String, PartialPair> = BTreeMap::new();
        for (name, view) in st.tensors() {
            let (which, base_key) = parse_adapter_key(&name).ok_or_else(|| {
                ConsolidateError::adapter(format!(
                    "tensor '{name}' is not a LoRA factor (modules_to_save and embedding adapters are not supported)"
                ))
            })?;
            let tensor = decode_view(&name, &view)?;
            let slot = partial.entry(base_key).or_default();
            match which {
                Factor::A => slot.a = Some(tensor),
                Factor::B => slot.b = Some(tensor),
            }
        }

        let mut pairs = BTreeMap::new();
        for (base_key, slot) in partial {
            let pair = match (slot.a, slot.b) {
                (Some(a), Some(b)) => LoraPair { a, b },
                (Some(_), None) => {
                    return Err(ConsolidateError::adapter(format!("lora_B missing for {base_key}")))
                }
                (None, _) => {
                    return Err(ConsolidateError::adapter(format!("lora_A missing for {base_key}")))
                }
            };
            check_rank(&base_key, &pair, config.r)?;
            pairs.insert(base_key, pair);
        }

        Ok(Self { dir: dir.to_path_buf(), config, pairs })
    }

    /// Build an adapter from in-memory parts.
    pub fn from_parts(config: PeftAdapterConfig, pairs: BTreeMap<String, LoraPair>) -> Result<Self> {
        config.validate()?;
        for (key, pair) in &pairs {
            check_rank(key, pair, config.r)?;
        }
        Ok(Self { dir: PathBuf::new(), config, pairs })
    }

    /// Adapter directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parsed adapter config.
    pub fn config(&self) -> &PeftAdapterConfig {
        &self.config
    }

    /// Pair targeting the given base weight key.
    pub fn pair(&self, base_key: &str) -> Option<&LoraPair> {
        self.pairs.get(base_key)
    }

    /// Base weight keys this adapter updates.
    pub fn target_keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    /// Number of adapted layers.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the adapter holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn check_rank(base_key: &str, pair: &LoraPair, r: usize) -> Result<()> {
    let (a_rank, _) = pair.a.dims2(base_key)?;
    let (_, b_rank) = pair.b.dims2(base_key)?;
    if a_rank != r || b_rank != r {
        return Err(ConsolidateError::ShapeMismatch {
            name: format!("{base_key} (lora rank)"),
            expected: vec![r, r],
            actual: vec![a_rank, b_rank],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Dtype;
    use safetensors::tensor::TensorView;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write_adapter(dir: &Path, config: &PeftAdapterConfig, tensors: &[(&str, Vec<usize>)]) {
        std::fs::write(dir.join(ADAPTER_CONFIG_FILE), config.to_json().unwrap()).unwrap();
        let encoded: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
            .iter()
            .map(|(n, s)| {
                let numel: usize = s.iter().product();
                ((*n).to_string(), s.clone(), Dtype::F32.encode(&vec![0.5; numel]))
            })
            .collect();
        let views: Vec<(&str, TensorView<'_>)> = encoded
            .iter()
            .map(|(n, s, b)| (n.as_str(), TensorView::new(safetensors::Dtype::F32, s.clone(), b).unwrap()))
            .collect();
        let bytes = safetensors::serialize(views, None::<HashMap<String, String>>).unwrap();
        std::fs::write(dir.join(ADAPTER_WEIGHTS_FILE), bytes).unwrap();
    }

    #[test]
    fn test_parse_adapter_key_variants() {
        assert_eq!(
            parse_adapter_key("base_model.model.model.layers.3.self_attn.q_proj.lora_A.weight"),
            Some((Factor::A, "model.layers.3.self_attn.q_proj.weight".to_string()))
        );
        assert_eq!(
            parse_adapter_key("base_model.model.model.layers.0.mlp.up_proj.lora_B.default.weight"),
            Some((Factor::B, "model.layers.0.mlp.up_proj.weight".to_string()))
        );
        assert_eq!(parse_adapter_key("base_model.model.lm_head.weight"), None);
    }

    #[test]
    fn test_load_pairs_factors() {
        let tmp = TempDir::new().unwrap();
        let config = PeftAdapterConfig::new(2, 4.0).with_target_modules(&["q_proj", "v_proj"]);
        write_adapter(
            tmp.path(),
            &config,
            &[
                ("base_model.model.model.layers.0.self_attn.q_proj.lora_A.weight", vec![2, 8]),
                ("base_model.model.model.layers.0.self_attn.q_proj.lora_B.weight", vec![8, 2]),
                ("base_model.model.model.layers.0.self_attn.v_proj.lora_A.weight", vec![2, 8]),
                ("base_model.model.model.layers.0.self_attn.v_proj.lora_B.weight", vec![8, 2]),
            ],
        );

        let adapter = LoraAdapter::load(tmp.path()).unwrap();
        assert_eq!(adapter.len(), 2);
        assert_eq!(adapter.config().scale(), 2.0);
        let pair = adapter.pair("model.layers.0.self_attn.q_proj.weight").unwrap();
        assert_eq!(pair.a.shape, vec![2, 8]);
        assert_eq!(pair.b.shape, vec![8, 2]);
        assert!(adapter.pair("model.layers.0.self_attn.k_proj.weight").is_none());
    }

    #[test]
    fn test_lone_factor_is_error() {
        let tmp = TempDir::new().unwrap();
        write_adapter(
            tmp.path(),
            &PeftAdapterConfig::new(2, 4.0),
            &[("base_model.model.model.layers.0.self_attn.q_proj.lora_A.weight", vec![2, 8])],
        );
        let err = LoraAdapter::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("lora_B missing"));
    }

    #[test]
    fn test_rank_mismatch_is_shape_error() {
        let tmp = TempDir::new().unwrap();
        write_adapter(
            tmp.path(),
            &PeftAdapterConfig::new(4, 4.0),
            &[
                ("base_model.model.model.layers.0.self_attn.q_proj.lora_A.weight", vec![2, 8]),
                ("base_model.model.model.layers.0.self_attn.q_proj.lora_B.weight", vec![8, 2]),
            ],
        );
        let err = LoraAdapter::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConsolidateError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_non_lora_tensor_rejected() {
        let tmp = TempDir::new().unwrap();
        write_adapter(
            tmp.path(),
            &PeftAdapterConfig::new(2, 4.0),
            &[("base_model.model.lm_head.weight", vec![4, 4])],
        );
        let err = LoraAdapter::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConsolidateError::Adapter { .. }));
    }

    #[test]
    fn test_missing_adapter_dir() {
        let err = LoraAdapter::load("/no/such/adapter").unwrap_err();
        assert!(matches!(err, ConsolidateError::ModelNotFound { .. }));
    }
}
