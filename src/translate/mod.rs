//! HuggingFace → consolidated checkpoint translation
//!
//! A static key-renaming table plus the rotary head permutation that moves
//! query/key projections between the two runtimes' layouts.

mod keys;
mod permute;

pub use keys::{
    canonical_order, layer_index, reshape_kind, strip_peft_prefix, translate_key, KeyTranslation,
    ReshapeKind, PEFT_PREFIX,
};
pub use permute::{permute, unpermute};
