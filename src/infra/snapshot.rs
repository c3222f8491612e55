//! TOML snapshots of a content tree.
//!
//! The command line reads the tree it serves from a snapshot and writes it
//! back after an import. Nodes are stored flat with parent links; a node's
//! `type` decides which of the optional fields apply.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::{ChildOrder, ContentId, Language, LocalizationSettings, TranslationContainer};

use super::memory::{MemoryContentTree, NodeData, StoredNode};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write snapshot `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

impl SnapshotError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub master_language: Language,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub sites: BTreeMap<String, ContentId>,
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Generic,
    Container,
    Item,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: ContentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ContentId>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_order: Option<ChildOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_in_menu: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_root: Option<ContentId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, String>,
}

impl TreeSnapshot {
    pub fn parse(data: &str) -> Result<Self, SnapshotError> {
        Ok(toml::from_str(data)?)
    }

    pub fn to_toml(&self) -> Result<String, SnapshotError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Capture the current state of `tree`.
    pub fn capture(tree: &MemoryContentTree) -> Self {
        let master = tree.master_language();
        let mut snapshot = Self {
            languages: tree
                .languages()
                .into_iter()
                .filter(|language| !language.matches(&master.code))
                .collect(),
            master_language: master,
            sites: tree.sites(),
            nodes: tree.nodes().into_iter().map(NodeSnapshot::from).collect(),
        };
        snapshot.normalize();
        snapshot
    }

    fn normalize(&mut self) {
        self.nodes.sort_by_key(|node| node.id);
    }

    pub fn into_tree(self) -> Result<MemoryContentTree, SnapshotError> {
        let nodes = self
            .nodes
            .into_iter()
            .map(StoredNode::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        MemoryContentTree::restore(self.master_language, self.languages, self.sites, nodes)
            .map_err(|err| SnapshotError::invalid(err.to_string()))
    }
}

impl From<StoredNode> for NodeSnapshot {
    fn from(node: StoredNode) -> Self {
        let mut snapshot = NodeSnapshot {
            id: node.id,
            parent: node.parent,
            name: node.name,
            node_type: NodeType::Generic,
            languages: node.languages.into_iter().collect(),
            original_text: None,
            child_order: None,
            visible_in_menu: None,
            translation_root: None,
            translations: BTreeMap::new(),
        };
        match node.data {
            NodeData::Generic => {}
            NodeData::Container(container) => {
                snapshot.node_type = NodeType::Container;
                snapshot.original_text = Some(container.original_text);
                snapshot.child_order = Some(container.child_order);
                snapshot.visible_in_menu = Some(container.visible_in_menu);
            }
            NodeData::Item {
                original_text,
                translations,
            } => {
                snapshot.node_type = NodeType::Item;
                snapshot.original_text = Some(original_text);
                snapshot.translations = translations;
            }
            NodeData::Settings(settings) => {
                snapshot.node_type = NodeType::Settings;
                snapshot.translation_root = settings.translation_root;
            }
        }
        snapshot
    }
}

impl TryFrom<NodeSnapshot> for StoredNode {
    type Error = SnapshotError;

    fn try_from(node: NodeSnapshot) -> Result<Self, Self::Error> {
        if node.node_type != NodeType::Item && !node.translations.is_empty() {
            return Err(SnapshotError::invalid(format!(
                "node `{}` carries translations but is not an item",
                node.id
            )));
        }

        let mut languages: BTreeSet<String> = node
            .languages
            .iter()
            .map(|code| code.trim().to_ascii_lowercase())
            .filter(|code| !code.is_empty())
            .collect();

        let data = match node.node_type {
            NodeType::Generic => NodeData::Generic,
            NodeType::Container => {
                let mut container =
                    TranslationContainer::new(node.original_text.unwrap_or_else(|| node.name.clone()));
                if let Some(order) = node.child_order {
                    container.child_order = order;
                }
                if let Some(visible) = node.visible_in_menu {
                    container.visible_in_menu = visible;
                }
                NodeData::Container(container)
            }
            NodeType::Item => {
                let translations: BTreeMap<String, String> = node
                    .translations
                    .into_iter()
                    .map(|(code, text)| (code.trim().to_ascii_lowercase(), text))
                    .collect();
                languages.extend(translations.keys().cloned());
                NodeData::Item {
                    original_text: node.original_text.unwrap_or_else(|| node.name.clone()),
                    translations,
                }
            }
            NodeType::Settings => NodeData::Settings(LocalizationSettings {
                translation_root: node.translation_root,
            }),
        };

        Ok(StoredNode {
            id: node.id,
            parent: node.parent,
            name: node.name,
            languages,
            data,
        })
    }
}

impl MemoryContentTree {
    pub fn to_snapshot(&self) -> TreeSnapshot {
        TreeSnapshot::capture(self)
    }

    pub fn from_snapshot(snapshot: TreeSnapshot) -> Result<Self, SnapshotError> {
        snapshot.into_tree()
    }
}

/// Read a tree from the snapshot at `path`.
pub fn load_tree(path: &Path) -> Result<MemoryContentTree, SnapshotError> {
    let data = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let tree = MemoryContentTree::from_snapshot(TreeSnapshot::parse(&data)?)?;
    info!(
        target = "glossa::snapshot",
        path = %path.display(),
        nodes = tree.node_count(),
        "Loaded content tree snapshot"
    );
    Ok(tree)
}

/// Write `tree` to `path`, replacing any previous snapshot.
pub fn save_tree(path: &Path, tree: &MemoryContentTree) -> Result<(), SnapshotError> {
    let encoded = tree.to_snapshot().to_toml()?;
    fs::write(path, encoded).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        target = "glossa::snapshot",
        path = %path.display(),
        nodes = tree.node_count(),
        "Saved content tree snapshot"
    );
    Ok(())
}
