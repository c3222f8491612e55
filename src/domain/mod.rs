//! Domain layer types and invariants.

pub mod key;
pub mod language;
pub mod node;

pub use key::{derive_key, is_element_name, normalize_lookup_key};
pub use language::{Language, fallback_chain};
pub use node::{
    ChildOrder, ContentId, ContentNode, LocalizationSettings, NodeKind, NodeTag,
    TranslationContainer, TranslationItem,
};
