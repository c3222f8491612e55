//! Repository traits describing the content store collaborators.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ContentId, ContentNode, Language};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("content store unavailable: {0}")]
    Unavailable(String),
    #[error("content `{0}` not found")]
    NotFound(ContentId),
    #[error("content store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn other(err: impl std::fmt::Display) -> Self {
        Self::Other(err.to_string())
    }

    /// Whether retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Read-only access to the hierarchical content store.
#[async_trait]
pub trait ContentTreeAccessor: Send + Sync {
    /// Children of `node` in the store's native order, resolved for
    /// `language` with fallback to broader variants and finally the master
    /// language of each child.
    async fn get_children(
        &self,
        node: ContentId,
        language: &Language,
    ) -> Result<Vec<ContentNode>, StoreError>;

    /// Languages in which `node` has a variant.
    async fn get_language_variants(&self, node: ContentId) -> Result<Vec<Language>, StoreError>;

    /// Ancestors of `node`, nearest parent first, in the master language.
    async fn get_ancestors(&self, node: ContentId) -> Result<Vec<ContentNode>, StoreError>;

    /// A single node in its master language.
    async fn get(&self, node: ContentId) -> Result<ContentNode, StoreError>;
}

/// Per-site resolution of the translation root.
#[async_trait]
pub trait SettingsResolver: Send + Sync {
    /// The translation root configured for `site_id`, if any.
    async fn get_translation_root(&self, site_id: &str)
    -> Result<Option<ContentNode>, StoreError>;
}
