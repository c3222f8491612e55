//! Lookup keys shown to editors.
//!
//! A key is the chain of container keys from just below the translation root
//! down to the node itself, e.g. `/jeroenstemerdink/textone`.

use std::iter;

use crate::domain::{ContentId, ContentNode, NodeKind, derive_key};

use super::repos::{ContentTreeAccessor, StoreError};

/// Lookup key of an existing node.
pub async fn lookup_key(
    accessor: &dyn ContentTreeAccessor,
    node: ContentId,
) -> Result<String, StoreError> {
    let own = accessor.get(node).await?;
    let ancestors = accessor.get_ancestors(node).await?;
    let leaf = own
        .translation_key()
        .unwrap_or_else(|| derive_key(&own.name));
    Ok(compose(ancestors.into_iter().rev(), leaf))
}

/// Lookup key a node named `original_text` would get once created under
/// `parent`.
pub async fn lookup_key_for_new(
    accessor: &dyn ContentTreeAccessor,
    parent: ContentId,
    original_text: &str,
) -> Result<String, StoreError> {
    let parent_node = accessor.get(parent).await?;
    let ancestors = accessor.get_ancestors(parent).await?;
    Ok(compose(
        ancestors.into_iter().rev().chain(iter::once(parent_node)),
        derive_key(original_text),
    ))
}

fn compose(root_first: impl Iterator<Item = ContentNode>, leaf: String) -> String {
    let mut parts: Vec<String> = root_first
        .filter(|node| matches!(node.kind, NodeKind::TranslationContainer(_)))
        .filter_map(|node| node.translation_key())
        // The outermost container is the translation root.
        .skip(1)
        .collect();
    parts.push(leaf);
    format!("/{}", parts.join("/"))
}
