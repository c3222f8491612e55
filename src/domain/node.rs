//! Content tree nodes as seen by the localization layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::key::derive_key;

/// Identifier of a node in the content tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u64);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordering rule a node applies to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildOrder {
    #[default]
    CreationOrder,
    Alphabetical,
}

/// A node resolved for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentNode {
    pub id: ContentId,
    pub parent: Option<ContentId>,
    pub name: String,
    /// Language the node's data was resolved in, after store fallback.
    pub language: Option<String>,
    pub kind: NodeKind,
}

impl ContentNode {
    /// Derived key for translation nodes, `None` for everything else.
    pub fn translation_key(&self) -> Option<String> {
        match &self.kind {
            NodeKind::TranslationContainer(container) => {
                Some(node_key(&container.original_text, &self.name))
            }
            NodeKind::TranslationItem(item) => Some(node_key(&item.original_text, &self.name)),
            NodeKind::Generic | NodeKind::SettingsHolder(_) => None,
        }
    }

    /// Whether a mutation of this node can change the served translations.
    pub fn affects_translations(&self) -> bool {
        self.kind.tag().affects_translations()
    }
}

fn node_key(original_text: &str, name: &str) -> String {
    if original_text.is_empty() {
        derive_key(name)
    } else {
        derive_key(original_text)
    }
}

/// Type-specific data of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Generic,
    TranslationContainer(TranslationContainer),
    TranslationItem(TranslationItem),
    SettingsHolder(LocalizationSettings),
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Generic => NodeTag::Generic,
            NodeKind::TranslationContainer(_) => NodeTag::TranslationContainer,
            NodeKind::TranslationItem(_) => NodeTag::TranslationItem,
            NodeKind::SettingsHolder(_) => NodeTag::SettingsHolder,
        }
    }
}

/// Data-free discriminant of [`NodeKind`], carried by content events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTag {
    Generic,
    TranslationContainer,
    TranslationItem,
    SettingsHolder,
}

impl NodeTag {
    pub fn affects_translations(self) -> bool {
        !matches!(self, NodeTag::Generic)
    }
}

/// A namespace level in the translation hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationContainer {
    pub original_text: String,
    pub child_order: ChildOrder,
    pub visible_in_menu: bool,
}

impl TranslationContainer {
    /// A container with the editor defaults: alphabetical children, hidden from navigation.
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            child_order: ChildOrder::Alphabetical,
            visible_in_menu: false,
        }
    }
}

/// A leaf translation, with `translation` resolved for the node's language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationItem {
    pub original_text: String,
    pub translation: String,
}

/// Per-site settings stored on a settings-holder node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalizationSettings {
    pub translation_root: Option<ContentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind) -> ContentNode {
        ContentNode {
            id: ContentId(7),
            parent: Some(ContentId(1)),
            name: "Jeroen Stemerdink".to_string(),
            language: Some("en".to_string()),
            kind,
        }
    }

    #[test]
    fn container_defaults() {
        let container = TranslationContainer::new("Common");
        assert_eq!(container.child_order, ChildOrder::Alphabetical);
        assert!(!container.visible_in_menu);
    }

    #[test]
    fn translation_key_prefers_original_text() {
        let item = node(NodeKind::TranslationItem(TranslationItem {
            original_text: "Text-One_2".to_string(),
            translation: "x".to_string(),
        }));
        assert_eq!(item.translation_key().as_deref(), Some("textone2"));
    }

    #[test]
    fn translation_key_falls_back_to_name() {
        let container = node(NodeKind::TranslationContainer(TranslationContainer::new("")));
        assert_eq!(container.translation_key().as_deref(), Some("jeroenstemerdink"));
    }

    #[test]
    fn generic_nodes_have_no_key() {
        assert_eq!(node(NodeKind::Generic).translation_key(), None);
        assert!(!node(NodeKind::Generic).affects_translations());
        assert!(node(NodeKind::SettingsHolder(LocalizationSettings::default())).affects_translations());
    }
}
