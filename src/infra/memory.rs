//! In-memory content tree.
//!
//! Backs the command line (loaded from a TOML snapshot) and the tests. It
//! honours the same contracts a real content store does: children come back
//! in the parent's configured order, every node exists in the master language,
//! reads resolve language variants through the fallback chain, and every
//! mutation is published as a [`ContentEvent`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::application::{
    events::{ContentEvent, ContentEventKind},
    import::TranslationImportTarget,
    lock::{rw_read, rw_write},
    repos::{ContentTreeAccessor, SettingsResolver, StoreError},
};
use crate::domain::{
    ChildOrder, ContentId, ContentNode, Language, LocalizationSettings, NodeKind, NodeTag,
    TranslationContainer, TranslationItem, fallback_chain,
};

use super::events::ContentEventHub;

const SOURCE: &str = "infra::memory";

/// Stored, language-independent form of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub id: ContentId,
    pub parent: Option<ContentId>,
    pub name: String,
    /// Lowercased codes of the variants this node exists in.
    pub languages: BTreeSet<String>,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Generic,
    Container(TranslationContainer),
    Item {
        original_text: String,
        /// Translation per lowercased language code.
        translations: BTreeMap<String, String>,
    },
    Settings(LocalizationSettings),
}

impl NodeData {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeData::Generic => NodeTag::Generic,
            NodeData::Container(_) => NodeTag::TranslationContainer,
            NodeData::Item { .. } => NodeTag::TranslationItem,
            NodeData::Settings(_) => NodeTag::SettingsHolder,
        }
    }
}

#[derive(Debug)]
struct TreeState {
    master: Language,
    catalog: Vec<Language>,
    sites: BTreeMap<String, ContentId>,
    nodes: BTreeMap<ContentId, StoredNode>,
    next_id: u64,
}

impl TreeState {
    fn node(&self, id: ContentId) -> Result<&StoredNode, StoreError> {
        self.nodes.get(&id).ok_or(StoreError::NotFound(id))
    }

    fn node_mut(&mut self, id: ContentId) -> Result<&mut StoredNode, StoreError> {
        self.nodes.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn resolve(&self, stored: &StoredNode, code: &str) -> ContentNode {
        let resolved = fallback_chain(code, &self.master.code)
            .into_iter()
            .find(|candidate| stored.languages.contains(candidate))
            .unwrap_or_else(|| self.master.code.to_ascii_lowercase());

        let kind = match &stored.data {
            NodeData::Generic => NodeKind::Generic,
            NodeData::Container(container) => NodeKind::TranslationContainer(container.clone()),
            NodeData::Item {
                original_text,
                translations,
            } => NodeKind::TranslationItem(TranslationItem {
                original_text: original_text.clone(),
                translation: translations.get(&resolved).cloned().unwrap_or_default(),
            }),
            NodeData::Settings(settings) => NodeKind::SettingsHolder(settings.clone()),
        };

        ContentNode {
            id: stored.id,
            parent: stored.parent,
            name: stored.name.clone(),
            language: Some(resolved),
            kind,
        }
    }

    fn children(&self, parent: ContentId) -> Vec<&StoredNode> {
        let order = match self.nodes.get(&parent).map(|node| &node.data) {
            Some(NodeData::Container(container)) => container.child_order,
            _ => ChildOrder::CreationOrder,
        };
        let mut children: Vec<&StoredNode> = self
            .nodes
            .values()
            .filter(|node| node.parent == Some(parent))
            .collect();
        if order == ChildOrder::Alphabetical {
            children.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then(a.id.cmp(&b.id))
            });
        }
        children
    }

    fn is_descendant(&self, node: ContentId, ancestor: ContentId) -> bool {
        parent_chain(&self.nodes, node).any(|id| id == ancestor)
    }

    fn catalog_language(&self, code: &str) -> Language {
        self.catalog
            .iter()
            .find(|language| language.matches(code))
            .cloned()
            .unwrap_or_else(|| Language::from_code(code))
    }
}

/// Ids above `node`, nearest first, never longer than the node count.
fn parent_chain(
    nodes: &BTreeMap<ContentId, StoredNode>,
    node: ContentId,
) -> impl Iterator<Item = ContentId> + '_ {
    std::iter::successors(nodes.get(&node).and_then(|n| n.parent), |id| {
        nodes.get(id).and_then(|n| n.parent)
    })
    .take(nodes.len())
}

#[derive(Debug)]
pub struct MemoryContentTree {
    state: RwLock<TreeState>,
    events: Option<Arc<ContentEventHub>>,
    available: AtomicBool,
}

impl MemoryContentTree {
    /// An empty tree whose catalog holds only `master`.
    pub fn new(master: Language) -> Self {
        Self {
            state: RwLock::new(TreeState {
                catalog: vec![master.clone()],
                master,
                sites: BTreeMap::new(),
                nodes: BTreeMap::new(),
                next_id: 1,
            }),
            events: None,
            available: AtomicBool::new(true),
        }
    }

    /// Rebuild a tree from stored parts, checking ids and parent links.
    pub fn restore(
        master: Language,
        catalog: Vec<Language>,
        sites: BTreeMap<String, ContentId>,
        nodes: Vec<StoredNode>,
    ) -> Result<Self, StoreError> {
        let master_code = master.code.to_ascii_lowercase();
        let mut by_id: BTreeMap<ContentId, StoredNode> = BTreeMap::new();
        for mut node in nodes {
            node.languages = node
                .languages
                .iter()
                .map(|code| code.to_ascii_lowercase())
                .collect();
            node.languages.insert(master_code.clone());
            if let Some(previous) = by_id.insert(node.id, node) {
                return Err(StoreError::other(format!("duplicate node id `{}`", previous.id)));
            }
        }
        for node in by_id.values() {
            if let Some(parent) = node.parent
                && !by_id.contains_key(&parent)
            {
                return Err(StoreError::other(format!(
                    "node `{}` refers to missing parent `{parent}`",
                    node.id
                )));
            }
        }
        for id in by_id.keys() {
            if parent_chain(&by_id, *id).any(|ancestor| ancestor == *id) {
                return Err(StoreError::other(format!("node `{id}` is its own ancestor")));
            }
        }
        for (site, node) in &sites {
            if !by_id.contains_key(node) {
                return Err(StoreError::other(format!(
                    "site `{site}` refers to missing node `{node}`"
                )));
            }
        }

        let mut full_catalog = vec![master.clone()];
        for language in catalog {
            if !full_catalog.iter().any(|seen| seen.matches(&language.code)) {
                full_catalog.push(language);
            }
        }

        let next_id = by_id.keys().next_back().map_or(1, |id| id.0 + 1);
        let tree = Self::new(master);
        {
            let mut state = rw_write(&tree.state, SOURCE, "restore");
            state.catalog = full_catalog;
            state.sites = sites;
            state.nodes = by_id;
            state.next_id = next_id;
        }
        Ok(tree)
    }

    /// Publish every mutation to `hub`.
    pub fn with_events(mut self, hub: Arc<ContentEventHub>) -> Self {
        self.events = Some(hub);
        self
    }

    /// Simulate an outage: while unavailable every read fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        debug!(available, "Memory content store availability changed");
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory content store is offline"))
        }
    }

    pub fn master_language(&self) -> Language {
        rw_read(&self.state, SOURCE, "master_language").master.clone()
    }

    /// Known languages, master first.
    pub fn languages(&self) -> Vec<Language> {
        rw_read(&self.state, SOURCE, "languages").catalog.clone()
    }

    pub fn sites(&self) -> BTreeMap<String, ContentId> {
        rw_read(&self.state, SOURCE, "sites").sites.clone()
    }

    /// Every node, ordered by id.
    pub fn nodes(&self) -> Vec<StoredNode> {
        rw_read(&self.state, SOURCE, "nodes")
            .nodes
            .values()
            .cloned()
            .collect()
    }

    pub fn node_count(&self) -> usize {
        rw_read(&self.state, SOURCE, "node_count").nodes.len()
    }

    /// Lowest id among nodes called `name`.
    pub fn find_by_name(&self, name: &str) -> Option<ContentId> {
        rw_read(&self.state, SOURCE, "find_by_name")
            .nodes
            .values()
            .find(|node| node.name == name)
            .map(|node| node.id)
    }

    pub fn add_language(&self, language: Language) {
        let mut state = rw_write(&self.state, SOURCE, "add_language");
        if !state.catalog.iter().any(|seen| seen.matches(&language.code)) {
            state.catalog.push(language);
        }
    }

    pub fn create_generic(
        &self,
        parent: Option<ContentId>,
        name: &str,
    ) -> Result<ContentId, StoreError> {
        self.insert(parent, name, NodeData::Generic)
    }

    pub fn create_settings(
        &self,
        parent: Option<ContentId>,
        name: &str,
        translation_root: Option<ContentId>,
    ) -> Result<ContentId, StoreError> {
        self.insert(
            parent,
            name,
            NodeData::Settings(LocalizationSettings { translation_root }),
        )
    }

    /// A container named after its original text, with the editor defaults.
    pub fn create_container(
        &self,
        parent: Option<ContentId>,
        original_text: &str,
    ) -> Result<ContentId, StoreError> {
        self.insert(
            parent,
            original_text,
            NodeData::Container(TranslationContainer::new(original_text)),
        )
    }

    pub fn create_item(&self, parent: ContentId, original_text: &str) -> Result<ContentId, StoreError> {
        self.insert(
            Some(parent),
            original_text,
            NodeData::Item {
                original_text: original_text.to_string(),
                translations: BTreeMap::new(),
            },
        )
    }

    fn insert(
        &self,
        parent: Option<ContentId>,
        name: &str,
        data: NodeData,
    ) -> Result<ContentId, StoreError> {
        let tag = data.tag();
        let id = {
            let mut state = rw_write(&self.state, SOURCE, "insert");
            if let Some(parent) = parent {
                state.node(parent)?;
            }
            let id = ContentId(state.next_id);
            state.next_id += 1;
            let languages = BTreeSet::from([state.master.code.to_ascii_lowercase()]);
            state.nodes.insert(
                id,
                StoredNode {
                    id,
                    parent,
                    name: name.to_string(),
                    languages,
                    data,
                },
            );
            id
        };
        self.publish(ContentEventKind::Published, id, tag);
        Ok(id)
    }

    /// Set the translation of an item in `language`, creating the variant.
    pub fn set_translation(
        &self,
        item: ContentId,
        language: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let code = language.trim().to_ascii_lowercase();
        {
            let mut state = rw_write(&self.state, SOURCE, "set_translation");
            let node = state.node_mut(item)?;
            let NodeData::Item { translations, .. } = &mut node.data else {
                return Err(StoreError::other(format!("node `{item}` is not a translation item")));
            };
            translations.insert(code.clone(), text.to_string());
            node.languages.insert(code);
        }
        self.publish(ContentEventKind::Published, item, NodeTag::TranslationItem);
        Ok(())
    }

    pub fn add_language_variant(&self, node: ContentId, language: &str) -> Result<(), StoreError> {
        let code = language.trim().to_ascii_lowercase();
        let tag = {
            let mut state = rw_write(&self.state, SOURCE, "add_language_variant");
            let stored = state.node_mut(node)?;
            stored.languages.insert(code);
            stored.data.tag()
        };
        self.publish(ContentEventKind::Published, node, tag);
        Ok(())
    }

    /// Delete one language variant; the master variant cannot be deleted.
    pub fn delete_language_variant(&self, node: ContentId, language: &str) -> Result<(), StoreError> {
        let code = language.trim().to_ascii_lowercase();
        let tag = {
            let mut state = rw_write(&self.state, SOURCE, "delete_language_variant");
            if state.master.matches(&code) {
                return Err(StoreError::other("the master language variant cannot be deleted"));
            }
            let stored = state.node_mut(node)?;
            stored.languages.remove(&code);
            if let NodeData::Item { translations, .. } = &mut stored.data {
                translations.remove(&code);
            }
            stored.data.tag()
        };
        self.publish(
            ContentEventKind::DeletedLanguage { language: code },
            node,
            tag,
        );
        Ok(())
    }

    pub fn set_translation_root(
        &self,
        settings: ContentId,
        root: Option<ContentId>,
    ) -> Result<(), StoreError> {
        {
            let mut state = rw_write(&self.state, SOURCE, "set_translation_root");
            if let Some(root) = root {
                state.node(root)?;
            }
            let stored = state.node_mut(settings)?;
            let NodeData::Settings(current) = &mut stored.data else {
                return Err(StoreError::other(format!(
                    "node `{settings}` does not hold localization settings"
                )));
            };
            current.translation_root = root;
        }
        self.publish(ContentEventKind::Published, settings, NodeTag::SettingsHolder);
        Ok(())
    }

    /// Use `node` as the settings holder of `site_id`.
    pub fn assign_site(&self, site_id: &str, node: ContentId) -> Result<(), StoreError> {
        let tag = {
            let mut state = rw_write(&self.state, SOURCE, "assign_site");
            let tag = state.node(node)?.data.tag();
            state.sites.insert(site_id.to_string(), node);
            tag
        };
        self.publish(ContentEventKind::Published, node, tag);
        Ok(())
    }

    pub fn move_node(&self, node: ContentId, new_parent: ContentId) -> Result<(), StoreError> {
        let (from, tag) = {
            let mut state = rw_write(&self.state, SOURCE, "move_node");
            state.node(new_parent)?;
            if node == new_parent || state.is_descendant(new_parent, node) {
                return Err(StoreError::other(format!(
                    "cannot move `{node}` below itself"
                )));
            }
            let stored = state.node_mut(node)?;
            let from = stored.parent.replace(new_parent);
            (from, stored.data.tag())
        };
        self.publish(ContentEventKind::Moved { from }, node, tag);
        Ok(())
    }

    /// Delete `node` and everything below it.
    pub fn delete_node(&self, node: ContentId) -> Result<(), StoreError> {
        let tag = {
            let mut state = rw_write(&self.state, SOURCE, "delete_node");
            let tag = state.node(node)?.data.tag();
            let doomed: Vec<ContentId> = state
                .nodes
                .keys()
                .copied()
                .filter(|id| *id == node || state.is_descendant(*id, node))
                .collect();
            for id in &doomed {
                state.nodes.remove(id);
            }
            state.sites.retain(|site, holder| {
                let keep = !doomed.contains(holder);
                if !keep {
                    warn!(site = %site, node = %holder, "Site lost its settings holder");
                }
                keep
            });
            tag
        };
        self.publish(ContentEventKind::Deleted, node, tag);
        Ok(())
    }

    fn publish(&self, kind: ContentEventKind, node: ContentId, tag: NodeTag) {
        if let Some(hub) = &self.events {
            hub.publish(ContentEvent::new(kind, node, tag));
        }
    }
}

#[async_trait]
impl ContentTreeAccessor for MemoryContentTree {
    async fn get_children(
        &self,
        node: ContentId,
        language: &Language,
    ) -> Result<Vec<ContentNode>, StoreError> {
        self.ensure_available()?;
        let state = rw_read(&self.state, SOURCE, "get_children");
        state.node(node)?;
        Ok(state
            .children(node)
            .into_iter()
            .map(|child| state.resolve(child, &language.code))
            .collect())
    }

    async fn get_language_variants(&self, node: ContentId) -> Result<Vec<Language>, StoreError> {
        self.ensure_available()?;
        let state = rw_read(&self.state, SOURCE, "get_language_variants");
        let stored = state.node(node)?;

        let mut variants: Vec<Language> = state
            .catalog
            .iter()
            .filter(|language| stored.languages.contains(&language.code.to_ascii_lowercase()))
            .cloned()
            .collect();
        for code in &stored.languages {
            if !variants.iter().any(|language| language.matches(code)) {
                variants.push(state.catalog_language(code));
            }
        }
        Ok(variants)
    }

    async fn get_ancestors(&self, node: ContentId) -> Result<Vec<ContentNode>, StoreError> {
        self.ensure_available()?;
        let state = rw_read(&self.state, SOURCE, "get_ancestors");
        state.node(node)?;
        parent_chain(&state.nodes, node)
            .map(|id| {
                state
                    .node(id)
                    .map(|stored| state.resolve(stored, &state.master.code))
            })
            .collect()
    }

    async fn get(&self, node: ContentId) -> Result<ContentNode, StoreError> {
        self.ensure_available()?;
        let state = rw_read(&self.state, SOURCE, "get");
        let stored = state.node(node)?;
        Ok(state.resolve(stored, &state.master.code))
    }
}

#[async_trait]
impl SettingsResolver for MemoryContentTree {
    async fn get_translation_root(
        &self,
        site_id: &str,
    ) -> Result<Option<ContentNode>, StoreError> {
        self.ensure_available()?;
        let state = rw_read(&self.state, SOURCE, "get_translation_root");

        let Some(holder) = state.sites.get(site_id).copied() else {
            debug!(site_id, "Site has no settings holder");
            return Ok(None);
        };
        let Some(NodeData::Settings(settings)) = state.nodes.get(&holder).map(|node| &node.data)
        else {
            debug!(site_id, holder = %holder, "Site settings holder carries no localization settings");
            return Ok(None);
        };
        let Some(root) = settings.translation_root else {
            return Ok(None);
        };
        match state.nodes.get(&root) {
            Some(stored) => Ok(Some(state.resolve(stored, &state.master.code))),
            None => {
                warn!(site_id, root = %root, "Configured translation root no longer exists");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TranslationImportTarget for MemoryContentTree {
    async fn list_children(&self, parent: ContentId) -> Result<Vec<ContentNode>, StoreError> {
        let master = self.master_language();
        self.get_children(parent, &master).await
    }

    async fn add_container(
        &self,
        parent: ContentId,
        original_text: &str,
    ) -> Result<ContentId, StoreError> {
        self.create_container(Some(parent), original_text)
    }

    async fn add_item(&self, parent: ContentId, original_text: &str) -> Result<ContentId, StoreError> {
        self.create_item(parent, original_text)
    }

    async fn store_translation(
        &self,
        item: ContentId,
        language: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        self.set_translation(item, language, text)
    }

    async fn register_language(&self, node: ContentId, language: &Language) -> Result<(), StoreError> {
        self.add_language(language.clone());
        self.add_language_variant(node, &language.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english() -> Language {
        Language::new("en", "English", "English")
    }

    fn french() -> Language {
        Language::new("fr", "French", "français")
    }

    fn names(children: &[ContentNode]) -> Vec<&str> {
        children.iter().map(|child| child.name.as_str()).collect()
    }

    #[tokio::test]
    async fn containers_sort_children_alphabetically() {
        let tree = MemoryContentTree::new(english());
        let generic = tree.create_generic(None, "Start").unwrap();
        tree.create_generic(Some(generic), "Zulu").unwrap();
        tree.create_generic(Some(generic), "alpha").unwrap();
        let container = tree.create_container(None, "Root").unwrap();
        tree.create_item(container, "Zulu").unwrap();
        tree.create_item(container, "alpha").unwrap();

        let generic_children = tree.get_children(generic, &english()).await.unwrap();
        let container_children = tree.get_children(container, &english()).await.unwrap();

        assert_eq!(names(&generic_children), vec!["Zulu", "alpha"]);
        assert_eq!(names(&container_children), vec!["alpha", "Zulu"]);
    }

    #[tokio::test]
    async fn item_translation_falls_back_to_master() {
        let tree = MemoryContentTree::new(english());
        tree.add_language(french());
        let root = tree.create_container(None, "Root").unwrap();
        let item = tree.create_item(root, "Hello").unwrap();
        tree.set_translation(item, "en", "Hi").unwrap();

        let children = tree
            .get_children(root, &Language::from_code("fr-CA"))
            .await
            .unwrap();
        assert_eq!(children[0].language.as_deref(), Some("en"));
        assert!(matches!(
            &children[0].kind,
            NodeKind::TranslationItem(item) if item.translation == "Hi"
        ));

        tree.set_translation(item, "fr", "Salut").unwrap();
        let children = tree
            .get_children(root, &Language::from_code("fr-CA"))
            .await
            .unwrap();
        assert_eq!(children[0].language.as_deref(), Some("fr"));
    }

    #[tokio::test]
    async fn variants_follow_catalog_order() {
        let tree = MemoryContentTree::new(english());
        tree.add_language(french());
        let root = tree.create_container(None, "Root").unwrap();
        tree.add_language_variant(root, "xx").unwrap();
        tree.add_language_variant(root, "FR").unwrap();

        let variants = tree.get_language_variants(root).await.unwrap();
        assert_eq!(variants, vec![english(), french(), Language::from_code("xx")]);
    }

    #[tokio::test]
    async fn ancestors_are_nearest_first() {
        let tree = MemoryContentTree::new(english());
        let a = tree.create_generic(None, "A").unwrap();
        let b = tree.create_container(Some(a), "B").unwrap();
        let c = tree.create_item(b, "C").unwrap();

        let ancestors = tree.get_ancestors(c).await.unwrap();
        assert_eq!(names(&ancestors), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn translation_root_resolution() {
        let tree = MemoryContentTree::new(english());
        let start = tree.create_settings(None, "Start", None).unwrap();
        assert_eq!(tree.get_translation_root("default").await.unwrap(), None);

        tree.assign_site("default", start).unwrap();
        assert_eq!(tree.get_translation_root("default").await.unwrap(), None);

        let root = tree.create_container(Some(start), "Translations").unwrap();
        tree.set_translation_root(start, Some(root)).unwrap();
        let resolved = tree.get_translation_root("default").await.unwrap().unwrap();
        assert_eq!(resolved.id, root);

        tree.delete_node(root).unwrap();
        assert_eq!(tree.get_translation_root("default").await.unwrap(), None);
    }

    #[tokio::test]
    async fn outage_fails_reads() {
        let tree = MemoryContentTree::new(english());
        let root = tree.create_container(None, "Root").unwrap();
        tree.set_available(false);

        assert!(tree.get_children(root, &english()).await.unwrap_err().is_transient());
        assert!(tree.get_translation_root("default").await.is_err());

        tree.set_available(true);
        assert!(tree.get(root).await.is_ok());
    }

    #[test]
    fn mutations_are_published() {
        let hub = Arc::new(ContentEventHub::new(16));
        let mut events = crate::application::events::ContentEventSource::subscribe(hub.as_ref());
        let tree = MemoryContentTree::new(english()).with_events(hub.clone());

        let root = tree.create_container(None, "Root").unwrap();
        let item = tree.create_item(root, "Hello").unwrap();
        tree.delete_language_variant(item, "fr").unwrap();
        tree.delete_node(item).unwrap();

        let tags: Vec<(NodeTag, ContentEventKind)> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| (event.content_tag, event.kind))
            .collect();
        assert_eq!(
            tags,
            vec![
                (NodeTag::TranslationContainer, ContentEventKind::Published),
                (NodeTag::TranslationItem, ContentEventKind::Published),
                (
                    NodeTag::TranslationItem,
                    ContentEventKind::DeletedLanguage {
                        language: "fr".to_string()
                    }
                ),
                (NodeTag::TranslationItem, ContentEventKind::Deleted),
            ]
        );
    }

    #[test]
    fn structural_errors() {
        let tree = MemoryContentTree::new(english());
        let root = tree.create_container(None, "Root").unwrap();
        let child = tree.create_container(Some(root), "Child").unwrap();

        assert_eq!(
            tree.create_item(ContentId(42), "Orphan"),
            Err(StoreError::NotFound(ContentId(42)))
        );
        assert!(tree.set_translation(root, "en", "x").is_err());
        assert!(tree.move_node(root, child).is_err());
        assert!(tree.delete_language_variant(root, "EN").is_err());
    }

    #[test]
    fn restore_rejects_dangling_parents() {
        let orphan = StoredNode {
            id: ContentId(2),
            parent: Some(ContentId(1)),
            name: "Orphan".to_string(),
            languages: BTreeSet::new(),
            data: NodeData::Generic,
        };
        assert!(MemoryContentTree::restore(english(), Vec::new(), BTreeMap::new(), vec![orphan]).is_err());
    }

    #[test]
    fn cyclic_parents_are_rejected() {
        let node = |id: u64, parent: u64| StoredNode {
            id: ContentId(id),
            parent: Some(ContentId(parent)),
            name: format!("Node {id}"),
            languages: BTreeSet::new(),
            data: NodeData::Generic,
        };

        let cycle = vec![node(1, 2), node(2, 1)];
        let Err(err) = MemoryContentTree::restore(english(), Vec::new(), BTreeMap::new(), cycle)
        else {
            panic!("a two-node cycle must be rejected");
        };
        assert_eq!(err, StoreError::other("node `1` is its own ancestor"));

        let own_parent = vec![node(3, 3)];
        assert!(
            MemoryContentTree::restore(english(), Vec::new(), BTreeMap::new(), own_parent).is_err()
        );
    }
}
