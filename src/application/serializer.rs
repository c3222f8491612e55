//! Translation tree serializer.
//!
//! Walks the translation subtree once per language and writes the nested
//! `<languages><language name=".." id="..">…</language></languages>`
//! document. The walk never fails outward: any error collapses into the empty
//! document, and the caller learns about it through
//! [`TranslationDocument::is_fallback`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use metrics::counter;
use quick_xml::{
    Reader, Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::domain::{ContentId, ContentNode, Language, NodeKind, is_element_name};

use super::repos::{ContentTreeAccessor, StoreError};

/// The document served when nothing better is available.
pub const EMPTY_DOCUMENT: &str = "<languages></languages>";

const MAX_DEPTH: usize = 64;
const METRIC_KEY_COLLISIONS: &str = "glossa_key_collision_total";

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write translation document: {0}")]
    Write(String),
    #[error("translation document is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("translation document is malformed: {0}")]
    Malformed(String),
    #[error("node `{node}` carries a character XML cannot represent")]
    InvalidCharacter { node: ContentId },
    #[error("translation tree deeper than {MAX_DEPTH} levels below `{node}`")]
    TooDeep { node: ContentId },
}

impl SerializeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SerializeError::Store(err) if err.is_transient())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// Produced by a complete walk of the tree.
    Rendered,
    /// The walk failed and the empty document was substituted.
    Fallback,
}

/// A serialized translation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationDocument {
    xml: String,
    origin: DocumentOrigin,
}

impl TranslationDocument {
    pub fn rendered(xml: String) -> Self {
        Self {
            xml,
            origin: DocumentOrigin::Rendered,
        }
    }

    pub fn empty() -> Self {
        Self::rendered(EMPTY_DOCUMENT.to_string())
    }

    pub fn fallback() -> Self {
        Self {
            xml: EMPTY_DOCUMENT.to_string(),
            origin: DocumentOrigin::Fallback,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.xml
    }

    pub fn origin(&self) -> DocumentOrigin {
        self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == DocumentOrigin::Fallback
    }
}

pub struct TranslationTreeSerializer {
    accessor: Arc<dyn ContentTreeAccessor>,
}

impl TranslationTreeSerializer {
    pub fn new(accessor: Arc<dyn ContentTreeAccessor>) -> Self {
        Self { accessor }
    }

    /// Serialize the tree under `root` for every language, never failing.
    pub async fn serialize(&self, root: ContentId, languages: &[Language]) -> TranslationDocument {
        match self.render(root, languages).await {
            Ok(xml) => {
                debug!(root = %root, languages = languages.len(), bytes = xml.len(), "Translation document rendered");
                TranslationDocument::rendered(xml)
            }
            Err(err) => {
                error!(
                    root = %root,
                    error = %err,
                    transient = err.is_transient(),
                    "Failed to build translation document; falling back to empty document"
                );
                TranslationDocument::fallback()
            }
        }
    }

    /// Serialize the tree under `root`, reporting the first failure.
    pub async fn render(
        &self,
        root: ContentId,
        languages: &[Language],
    ) -> Result<String, SerializeError> {
        let mut writer = Writer::new(Vec::new());

        write(&mut writer, Event::Start(BytesStart::new("languages")))?;
        for language in languages {
            if !is_xml_text(&language.english_name) || !is_xml_text(&language.code) {
                return Err(SerializeError::InvalidCharacter { node: root });
            }
            let start = BytesStart::new("language").with_attributes([
                ("name", language.english_name.as_str()),
                ("id", language.code.as_str()),
            ]);
            write(&mut writer, Event::Start(start))?;
            self.write_children(&mut writer, root, language, 0).await?;
            write(&mut writer, Event::End(BytesEnd::new("language")))?;
        }
        write(&mut writer, Event::End(BytesEnd::new("languages")))?;

        let xml = String::from_utf8(writer.into_inner())
            .map_err(|err| SerializeError::Encoding(err.to_string()))?;
        check_well_formed(&xml)?;
        Ok(xml)
    }

    fn write_children<'a>(
        &'a self,
        writer: &'a mut Writer<Vec<u8>>,
        parent: ContentId,
        language: &'a Language,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), SerializeError>> {
        async move {
            if depth >= MAX_DEPTH {
                return Err(SerializeError::TooDeep { node: parent });
            }

            let children = self.accessor.get_children(parent, language).await?;
            for (child, key) in select_unique_keys(parent, children) {
                match &child.kind {
                    NodeKind::TranslationContainer(_) => {
                        let mut nested = Writer::new(Vec::new());
                        self.write_children(&mut nested, child.id, language, depth + 1)
                            .await?;
                        let body = nested.into_inner();
                        // Self-closing marks a container without entries; items always use a pair.
                        if body.is_empty() {
                            write(writer, Event::Empty(BytesStart::new(key.as_str())))?;
                        } else {
                            write(writer, Event::Start(BytesStart::new(key.as_str())))?;
                            writer.get_mut().extend_from_slice(&body);
                            write(writer, Event::End(BytesEnd::new(key.as_str())))?;
                        }
                    }
                    NodeKind::TranslationItem(item) => {
                        if !is_xml_text(&item.translation) {
                            return Err(SerializeError::InvalidCharacter { node: child.id });
                        }
                        write(writer, Event::Start(BytesStart::new(key.as_str())))?;
                        if !item.translation.is_empty() {
                            write(writer, Event::Text(BytesText::new(&item.translation)))?;
                        }
                        write(writer, Event::End(BytesEnd::new(key.as_str())))?;
                    }
                    NodeKind::Generic | NodeKind::SettingsHolder(_) => {}
                }
            }
            Ok(())
        }
        .boxed()
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), SerializeError> {
    writer
        .write_event(event)
        .map_err(|err| SerializeError::Write(err.to_string()))
}

/// Keep translation children whose keys are usable, one node per key.
///
/// Siblings that derive the same key are resolved in favour of the lowest
/// content id, independent of the order the store returned them in.
fn select_unique_keys(parent: ContentId, children: Vec<ContentNode>) -> Vec<(ContentNode, String)> {
    let keyed: Vec<(ContentNode, String)> = children
        .into_iter()
        .filter_map(|child| {
            let key = child.translation_key()?;
            if !is_element_name(&key) {
                warn!(
                    parent = %parent,
                    node = %child.id,
                    name = %child.name,
                    key = %key,
                    "Translation node skipped: derived key is not a valid element name"
                );
                return None;
            }
            Some((child, key))
        })
        .collect();

    let mut winners: HashMap<&str, ContentId> = HashMap::with_capacity(keyed.len());
    for (child, key) in &keyed {
        winners
            .entry(key.as_str())
            .and_modify(|winner| {
                if child.id < *winner {
                    *winner = child.id;
                }
            })
            .or_insert(child.id);
    }
    let winners: HashMap<String, ContentId> = winners
        .into_iter()
        .map(|(key, id)| (key.to_string(), id))
        .collect();

    keyed
        .into_iter()
        .filter(|(child, key)| {
            let winner = winners.get(key).copied().unwrap_or(child.id);
            if winner == child.id {
                return true;
            }
            warn!(
                parent = %parent,
                key = %key,
                kept = %winner,
                skipped = %child.id,
                "Translation key collision between siblings"
            );
            counter!(METRIC_KEY_COLLISIONS).increment(1);
            false
        })
        .collect()
}

/// Characters allowed by XML 1.0.
fn is_xml_text(value: &str) -> bool {
    value.chars().all(|c| {
        matches!(c, '\t' | '\n' | '\r')
            || ('\u{20}'..='\u{D7FF}').contains(&c)
            || ('\u{E000}'..='\u{FFFD}').contains(&c)
            || c >= '\u{10000}'
    })
}

fn check_well_formed(xml: &str) -> Result<(), SerializeError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(err) => return Err(SerializeError::Malformed(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryContentTree;

    fn english() -> Language {
        Language::new("en", "English", "English")
    }

    fn french() -> Language {
        Language::new("fr", "French", "français")
    }

    fn tree_with_root() -> (Arc<MemoryContentTree>, ContentId) {
        let tree = Arc::new(MemoryContentTree::new(english()));
        tree.add_language(french());
        let root = tree
            .create_container(None, "Translations")
            .expect("root container");
        tree.add_language_variant(root, "fr").expect("fr variant");
        (tree, root)
    }

    #[tokio::test]
    async fn renders_nested_document_per_language() {
        let (tree, root) = tree_with_root();
        let common = tree.create_container(Some(root), "Common").unwrap();
        let hello = tree.create_item(common, "Hello").unwrap();
        tree.set_translation(hello, "en", "Hi").unwrap();
        tree.set_translation(hello, "fr", "Salut").unwrap();

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let document = serializer.serialize(root, &[english(), french()]).await;

        assert!(!document.is_fallback());
        insta::assert_snapshot!(
            document.as_str(),
            @r#"<languages><language name="English" id="en"><common><hello>Hi</hello></common></language><language name="French" id="fr"><common><hello>Salut</hello></common></language></languages>"#
        );
    }

    #[tokio::test]
    async fn empty_containers_self_close_and_empty_items_keep_a_pair() {
        let (tree, root) = tree_with_root();
        let empty = tree.create_container(Some(root), "Empty Box").unwrap();
        let blank = tree.create_item(root, "Blank").unwrap();
        tree.set_translation(blank, "en", "").unwrap();
        let _ = empty;

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let xml = serializer.render(root, &[english()]).await.unwrap();

        assert_eq!(
            xml,
            r#"<languages><language name="English" id="en"><blank></blank><emptybox/></language></languages>"#
        );
    }

    #[tokio::test]
    async fn generic_children_are_skipped() {
        let (tree, root) = tree_with_root();
        tree.create_generic(Some(root), "Landing page").unwrap();
        let item = tree.create_item(root, "Title").unwrap();
        tree.set_translation(item, "en", "Welcome").unwrap();

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let xml = serializer.render(root, &[english()]).await.unwrap();

        assert_eq!(
            xml,
            r#"<languages><language name="English" id="en"><title>Welcome</title></language></languages>"#
        );
    }

    #[tokio::test]
    async fn text_is_escaped() {
        let (tree, root) = tree_with_root();
        let item = tree.create_item(root, "Terms").unwrap();
        tree.set_translation(item, "en", "Fish & <Chips>").unwrap();

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let xml = serializer.render(root, &[english()]).await.unwrap();

        assert!(xml.contains("<terms>Fish &amp; &lt;Chips&gt;</terms>"));
    }

    #[tokio::test]
    async fn collision_keeps_lowest_id() {
        let (tree, root) = tree_with_root();
        let first = tree.create_item(root, "Sign In").unwrap();
        let second = tree.create_item(root, "sign-in").unwrap();
        tree.set_translation(first, "en", "first").unwrap();
        tree.set_translation(second, "en", "second").unwrap();

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let xml = serializer.render(root, &[english()]).await.unwrap();

        assert_eq!(xml.matches("<signin>").count(), 1);
        assert!(xml.contains("<signin>first</signin>"));
    }

    #[tokio::test]
    async fn unusable_keys_are_skipped() {
        let (tree, root) = tree_with_root();
        tree.create_item(root, "!!!").unwrap();
        tree.create_item(root, "2FA").unwrap();

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let xml = serializer.render(root, &[english()]).await.unwrap();

        assert_eq!(
            xml,
            r#"<languages><language name="English" id="en"></language></languages>"#
        );
    }

    #[tokio::test]
    async fn store_failure_yields_fallback_document() {
        let (tree, root) = tree_with_root();
        tree.set_available(false);

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let document = serializer.serialize(root, &[english()]).await;

        assert!(document.is_fallback());
        assert_eq!(document.as_str(), EMPTY_DOCUMENT);
    }

    #[tokio::test]
    async fn control_characters_yield_fallback_document() {
        let (tree, root) = tree_with_root();
        let item = tree.create_item(root, "Bell").unwrap();
        tree.set_translation(item, "en", "ding\u{7}").unwrap();

        let serializer = TranslationTreeSerializer::new(tree.clone());
        let err = serializer.render(root, &[english()]).await.unwrap_err();
        assert!(matches!(err, SerializeError::InvalidCharacter { node } if node == item));

        assert!(serializer.serialize(root, &[english()]).await.is_fallback());
    }

    #[tokio::test]
    async fn zero_languages_render_empty_document() {
        let (tree, root) = tree_with_root();
        let serializer = TranslationTreeSerializer::new(tree.clone());
        let document = serializer.serialize(root, &[]).await;
        assert_eq!(document.as_str(), EMPTY_DOCUMENT);
        assert!(!document.is_fallback());
    }

    #[test]
    fn xml_text_rules() {
        assert!(is_xml_text("plain\ttext\n"));
        assert!(is_xml_text("emoji 🎉"));
        assert!(!is_xml_text("nul\u{0}"));
        assert!(!is_xml_text("\u{FFFE}"));
    }
}
