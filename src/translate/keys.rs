//! State-dict key renaming.

use crate::error::{ConsolidateError, Result};
use std::cmp::Ordering;

/// Prefix PEFT adds to every wrapped module path.
pub const PEFT_PREFIX: &str = "base_model.model.";

/// Per-layer suffixes and their consolidated names.
const LAYER_TABLE: [(&str, &str); 9] = [
    ("self_attn.q_proj.weight", "attention.wq.weight"),
    ("self_attn.k_proj.weight", "attention.wk.weight"),
    ("self_attn.v_proj.weight", "attention.wv.weight"),
    ("self_attn.o_proj.weight", "attention.wo.weight"),
    ("mlp.gate_proj.weight", "feed_forward.w1.weight"),
    ("mlp.down_proj.weight", "feed_forward.w2.weight"),
    ("mlp.up_proj.weight", "feed_forward.w3.weight"),
    ("input_layernorm.weight", "attention_norm.weight"),
    ("post_attention_layernorm.weight", "ffn_norm.weight"),
];

/// Outcome of translating one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTranslation {
    /// Keep the tensor under a new name.
    Renamed(String),
    /// Drop the tensor (rotary caches, adapter factors).
    Skipped,
}

/// Layout change applied to a translated tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReshapeKind {
    None,
    /// Undo the HF rotary permutation using the query head count.
    QueryHeads,
    /// Undo the HF rotary permutation using the key/value head count.
    KeyValueHeads,
}

/// Remove every PEFT wrapper prefix.
pub fn strip_peft_prefix(key: &str) -> String {
    key.replace(PEFT_PREFIX, "")
}

/// Translate a HuggingFace LLaMA state-dict key to the consolidated name.
///
/// Unknown keys are errors: a partially translated checkpoint is never written.
pub fn translate_key(key: &str) -> Result<KeyTranslation> {
    let k = strip_peft_prefix(key);
    let unknown = || ConsolidateError::UnknownKey { key: key.to_string() };

    match k.as_str() {
        "model.embed_tokens.weight" => return Ok(KeyTranslation::Renamed("tok_embeddings.weight".into())),
        "model.norm.weight" => return Ok(KeyTranslation::Renamed("norm.weight".into())),
        "lm_head.weight" => return Ok(KeyTranslation::Renamed("output.weight".into())),
        _ => {}
    }

    let rest = k.strip_prefix("model.layers.").ok_or_else(unknown)?;
    if k.ends_with("rotary_emb.inv_freq") || k.contains("lora") {
        return Ok(KeyTranslation::Skipped);
    }

    let (layer, suffix) = rest.split_once('.').ok_or_else(unknown)?;
    if layer.parse::<usize>().is_err() {
        return Err(unknown());
    }

    LAYER_TABLE
        .iter()
        .find(|(hf, _)| *hf == suffix)
        .map(|(_, consolidated)| KeyTranslation::Renamed(format!("layers.{layer}.{consolidated}")))
        .ok_or_else(unknown)
}

/// Layout change required for a consolidated key.
pub fn reshape_kind(consolidated_key: &str) -> ReshapeKind {
    if consolidated_key.ends_with(".attention.wq.weight") {
        ReshapeKind::QueryHeads
    } else if consolidated_key.ends_with(".attention.wk.weight") {
        ReshapeKind::KeyValueHeads
    } else {
        ReshapeKind::None
    }
}

/// Layer index of a HF or consolidated per-layer key.
pub fn layer_index(key: &str) -> Option<usize> {
    let k = strip_peft_prefix(key);
    let rest = k
        .strip_prefix("model.layers.")
        .or_else(|| k.strip_prefix("layers."))?;
    rest.split('.').next()?.parse().ok()
}

fn sort_rank(key: &str) -> (u8, usize) {
    let k = strip_peft_prefix(key);
    if k.ends_with("embed_tokens.weight") {
        (0, 0)
    } else if let Some(layer) = layer_index(&k) {
        (1, layer)
    } else if k == "model.norm.weight" {
        (2, 0)
    } else if k == "lm_head.weight" {
        (3, 0)
    } else {
        (4, 0)
    }
}

/// Sort keys in model order: embeddings, layers by index, final norm, head, others.
pub fn canonical_order<S: AsRef<str>>(keys: &mut [S]) {
    keys.sort_by(|a, b| {
        let (a, b) = (a.as_ref(), b.as_ref());
        match sort_rank(a).cmp(&sort_rank(b)) {
            Ordering::Equal => a.cmp(b),
            other => other,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renamed(key: &str) -> String {
        match translate_key(key).unwrap() {
            KeyTranslation::Renamed(k) => k,
            KeyTranslation::Skipped => panic!("{key} was skipped"),
        }
    }

    #[test]
    fn test_global_keys() {
        assert_eq!(renamed("model.embed_tokens.weight"), "tok_embeddings.weight");
        assert_eq!(renamed("model.norm.weight"), "norm.weight");
        assert_eq!(renamed("lm_head.weight"), "output.weight");
    }

    #[test]
    fn test_layer_table() {
        let cases = [
            ("self_attn.q_proj.weight", "attention.wq.weight"),
            ("self_attn.k_proj.weight", "attention.wk.weight"),
            ("self_attn.v_proj.weight", "attention.wv.weight"),
            ("self_attn.o_proj.weight", "attention.wo.weight"),
            ("mlp.gate_proj.weight", "feed_forward.w1.weight"),
            ("mlp.down_proj.weight", "feed_forward.w2.weight"),
            ("mlp.up_proj.weight", "feed_forward.w3.weight"),
            ("input_layernorm.weight", "attention_norm.weight"),
            ("post_attention_layernorm.weight", "ffn_norm.weight"),
        ];
        for (hf, consolidated) in cases {
            assert_eq!(renamed(&format!("model.layers.17.{hf}")), format!("layers.17.{consolidated}"));
        }
    }

    #[test]
    fn test_peft_prefix_is_stripped() {
        assert_eq!(
            renamed("base_model.model.model.layers.0.self_attn.q_proj.weight"),
            "layers.0.attention.wq.weight"
        );
        assert_eq!(renamed("base_model.model.lm_head.weight"), "output.weight");
    }

    #[test]
    fn test_skipped_keys() {
        assert_eq!(
            translate_key("model.layers.3.self_attn.rotary_emb.inv_freq").unwrap(),
            KeyTranslation::Skipped
        );
        assert_eq!(
            translate_key("base_model.model.model.layers.3.self_attn.q_proj.lora_A.weight").unwrap(),
            KeyTranslation::Skipped
        );
    }

    #[test]
    fn test_unknown_keys_abort() {
        for key in [
            "model.layers.0.mlp.fc1.weight",
            "model.layers.x.self_attn.q_proj.weight",
            "model.layers",
            "transformer.wte.weight",
            "model.embed_positions.weight",
        ] {
            let err = translate_key(key).unwrap_err();
            assert!(matches!(err, ConsolidateError::UnknownKey { .. }), "{key}");
        }
    }

    #[test]
    fn test_lora_outside_layers_is_unknown() {
        assert!(translate_key("lora_embedding_A").is_err());
    }

    #[test]
    fn test_reshape_kind() {
        assert_eq!(reshape_kind("layers.0.attention.wq.weight"), ReshapeKind::QueryHeads);
        assert_eq!(reshape_kind("layers.0.attention.wk.weight"), ReshapeKind::KeyValueHeads);
        assert_eq!(reshape_kind("layers.0.attention.wv.weight"), ReshapeKind::None);
        assert_eq!(reshape_kind("tok_embeddings.weight"), ReshapeKind::None);
    }

    #[test]
    fn test_layer_index() {
        assert_eq!(layer_index("model.layers.12.mlp.up_proj.weight"), Some(12));
        assert_eq!(layer_index("layers.3.ffn_norm.weight"), Some(3));
        assert_eq!(layer_index("base_model.model.model.layers.7.self_attn.q_proj.weight"), Some(7));
        assert_eq!(layer_index("model.norm.weight"), None);
    }

    #[test]
    fn test_canonical_order() {
        let mut keys = vec![
            "lm_head.weight",
            "model.layers.10.mlp.up_proj.weight",
            "model.norm.weight",
            "model.layers.2.self_attn.q_proj.weight",
            "model.embed_tokens.weight",
            "model.layers.2.input_layernorm.weight",
        ];
        canonical_order(&mut keys);
        assert_eq!(
            keys,
            vec![
                "model.embed_tokens.weight",
                "model.layers.2.input_layernorm.weight",
                "model.layers.2.self_attn.q_proj.weight",
                "model.layers.10.mlp.up_proj.weight",
                "model.norm.weight",
                "lm_head.weight",
            ]
        );
    }
}
