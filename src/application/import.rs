//! Import of classic translation XML files into the content tree.
//!
//! Elements with children become containers, leaf elements become items.
//! Existing nodes are matched by derived key, so importing the same file
//! twice updates translations instead of duplicating nodes.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{ContentId, ContentNode, Language, NodeTag, derive_key, is_element_name};

use super::repos::StoreError;
use super::table::resolve_reference;

const NAME_ATTRIBUTE: &str = "name";
const DESCRIPTION_ATTRIBUTE: &str = "description";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed translation file: {0}")]
    Malformed(String),
    #[error("expected `languages` root element, found `{0}`")]
    UnexpectedRoot(String),
    #[error("`language` element without an `id` attribute")]
    MissingLanguageId,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Write access needed to merge a file into the tree.
#[async_trait]
pub trait TranslationImportTarget: Send + Sync {
    /// Children of `parent` in the master language.
    async fn list_children(&self, parent: ContentId) -> Result<Vec<ContentNode>, StoreError>;

    async fn add_container(
        &self,
        parent: ContentId,
        original_text: &str,
    ) -> Result<ContentId, StoreError>;

    async fn add_item(&self, parent: ContentId, original_text: &str)
    -> Result<ContentId, StoreError>;

    async fn store_translation(
        &self,
        item: ContentId,
        language: &str,
        text: &str,
    ) -> Result<(), StoreError>;

    /// Make `language` known and give `node` a variant in it.
    async fn register_language(
        &self,
        node: ContentId,
        language: &Language,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub containers_created: usize,
    pub items_created: usize,
    pub items_updated: usize,
    pub skipped: usize,
    pub languages: Vec<String>,
}

#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    attributes: HashMap<String, String>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Merge `xml` into the tree below `parent`.
pub async fn import_language_file(
    target: &dyn TranslationImportTarget,
    parent: ContentId,
    xml: &str,
) -> Result<ImportReport, ImportError> {
    let root = parse_document(xml)?;
    if root.name != "languages" {
        return Err(ImportError::UnexpectedRoot(root.name));
    }

    let mut report = ImportReport::default();
    for element in &root.children {
        if element.name != "language" {
            warn!(element = %element.name, "Skipping unexpected element in translation file");
            report.skipped += 1;
            continue;
        }
        let code = element
            .attribute("id")
            .ok_or(ImportError::MissingLanguageId)?;
        let english_name = element.attribute(NAME_ATTRIBUTE).unwrap_or(code);
        let language = Language::new(code, english_name, english_name);

        target.register_language(parent, &language).await?;
        merge_children(target, parent, &element.children, &language.code, &mut report).await?;
        report.languages.push(language.code);
    }

    info!(
        parent = %parent,
        languages = report.languages.len(),
        containers_created = report.containers_created,
        items_created = report.items_created,
        items_updated = report.items_updated,
        skipped = report.skipped,
        "Translation file imported"
    );
    Ok(report)
}

fn merge_children<'a>(
    target: &'a dyn TranslationImportTarget,
    parent: ContentId,
    elements: &'a [XmlElement],
    language: &'a str,
    report: &'a mut ImportReport,
) -> BoxFuture<'a, Result<(), ImportError>> {
    async move {
        let mut existing: HashMap<String, (ContentId, NodeTag)> = HashMap::new();
        for child in target.list_children(parent).await? {
            if let Some(key) = child.translation_key() {
                existing
                    .entry(key)
                    .and_modify(|entry| {
                        if child.id < entry.0 {
                            *entry = (child.id, child.kind.tag());
                        }
                    })
                    .or_insert((child.id, child.kind.tag()));
            }
        }

        for element in elements {
            if element.children.is_empty() {
                let name = element
                    .attribute(NAME_ATTRIBUTE)
                    .unwrap_or(element.name.as_str());
                let key = derive_key(name);
                if !is_element_name(&key) {
                    warn!(parent = %parent, name, "Skipping item with unusable key");
                    report.skipped += 1;
                    continue;
                }
                let item = match existing.get(&key) {
                    Some((id, NodeTag::TranslationItem)) => {
                        report.items_updated += 1;
                        *id
                    }
                    Some((id, tag)) => {
                        warn!(
                            parent = %parent,
                            key = %key,
                            taken_by = %id,
                            tag = ?tag,
                            "Skipping item; key taken by another node"
                        );
                        report.skipped += 1;
                        continue;
                    }
                    None => {
                        let id = target.add_item(parent, name).await?;
                        existing.insert(key, (id, NodeTag::TranslationItem));
                        report.items_created += 1;
                        id
                    }
                };
                let translation = if element.text.is_empty() {
                    element.attribute(DESCRIPTION_ATTRIBUTE).unwrap_or_default()
                } else {
                    element.text.as_str()
                };
                target.store_translation(item, language, translation).await?;
            } else {
                let key = derive_key(&element.name);
                let container = match existing.get(&key) {
                    Some((id, NodeTag::TranslationContainer)) => *id,
                    Some((id, tag)) => {
                        warn!(
                            parent = %parent,
                            key = %key,
                            taken_by = %id,
                            tag = ?tag,
                            "Skipping container; key taken by another node"
                        );
                        report.skipped += 1;
                        continue;
                    }
                    None => {
                        let id = target.add_container(parent, &element.name).await?;
                        existing.insert(key, (id, NodeTag::TranslationContainer));
                        report.containers_created += 1;
                        id
                    }
                };
                merge_children(target, container, &element.children, language, report).await?;
            }
        }
        Ok(())
    }
    .boxed()
}

fn parse_document(xml: &str) -> Result<XmlElement, ImportError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| ImportError::Malformed(err.to_string()))?;
        match event {
            Event::Start(start) => stack.push(open_element(&start, &reader)?),
            Event::Empty(start) => {
                let element = open_element(&start, &reader)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(ImportError::Malformed("unbalanced end tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(text) => {
                if let Some(element) = stack.last_mut() {
                    let content = text
                        .xml_content()
                        .map_err(|err| ImportError::Malformed(err.to_string()))?;
                    element.text.push_str(&content);
                }
            }
            Event::CData(data) => {
                if let Some(element) = stack.last_mut() {
                    element
                        .text
                        .push_str(&String::from_utf8_lossy(data.into_inner().as_ref()));
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(element) = stack.last_mut() {
                    element
                        .text
                        .push_str(&resolve_reference(&reference).map_err(ImportError::Malformed)?);
                }
            }
            Event::Eof => {
                return Err(ImportError::Malformed(
                    "document ended before the root element closed".to_string(),
                ));
            }
            _ => {}
        }
    }
}

fn open_element(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<XmlElement, ImportError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = HashMap::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| ImportError::Malformed(err.to_string()))?;
        let value = attribute
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| ImportError::Malformed(err.to_string()))?;
        attributes.insert(
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            value.into_owned(),
        );
    }
    Ok(XmlElement {
        name,
        attributes,
        ..XmlElement::default()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::provider::{ContentLocalizationProvider, ProviderOptions};
    use crate::application::service::TranslationSource;
    use crate::infra::memory::MemoryContentTree;

    const FILE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<languages>
  <language name="English" id="en">
    <checkout>
      <button name="Place Order">Place order</button>
      <empty description="Your cart is empty" />
    </checkout>
    <welcome>Welcome &amp; hello</welcome>
  </language>
  <language name="French" id="fr">
    <checkout>
      <button name="Place Order">Commander</button>
    </checkout>
  </language>
</languages>"#;

    fn seeded() -> (Arc<MemoryContentTree>, ContentId) {
        let tree = Arc::new(MemoryContentTree::new(Language::new("en", "English", "English")));
        let start = tree.create_settings(None, "Start", None).unwrap();
        let root = tree.create_container(Some(start), "Translations").unwrap();
        tree.set_translation_root(start, Some(root)).unwrap();
        tree.assign_site("default", start).unwrap();
        (tree, root)
    }

    #[tokio::test]
    async fn imports_containers_items_and_languages() {
        let (tree, root) = seeded();

        let report = import_language_file(tree.as_ref(), root, FILE).await.unwrap();

        assert_eq!(report.containers_created, 1);
        assert_eq!(report.items_created, 3);
        assert_eq!(report.items_updated, 1);
        assert_eq!(report.languages, vec!["en", "fr"]);

        let provider =
            ContentLocalizationProvider::new(ProviderOptions::default(), tree.clone(), tree.clone());
        provider.load().await;
        assert_eq!(provider.translate("/checkout/placeorder", "fr").as_deref(), Some("Commander"));
        assert_eq!(
            provider.translate("/checkout/empty", "en").as_deref(),
            Some("Your cart is empty")
        );
        assert_eq!(provider.translate("/welcome", "en").as_deref(), Some("Welcome & hello"));
    }

    #[tokio::test]
    async fn reimport_updates_in_place() {
        let (tree, root) = seeded();
        import_language_file(tree.as_ref(), root, FILE).await.unwrap();
        let nodes = tree.node_count();

        let report = import_language_file(tree.as_ref(), root, FILE).await.unwrap();

        assert_eq!(report.containers_created, 0);
        assert_eq!(report.items_created, 0);
        assert_eq!(report.items_updated, 4);
        assert_eq!(tree.node_count(), nodes);
    }

    #[tokio::test]
    async fn rejects_malformed_files() {
        let (tree, root) = seeded();
        assert!(matches!(
            import_language_file(tree.as_ref(), root, "<languages><language id=\"en\">").await,
            Err(ImportError::Malformed(_))
        ));
        assert!(matches!(
            import_language_file(tree.as_ref(), root, "<resources/>").await,
            Err(ImportError::UnexpectedRoot(name)) if name == "resources"
        ));
        assert!(matches!(
            import_language_file(tree.as_ref(), root, "<languages><language><a>x</a></language></languages>").await,
            Err(ImportError::MissingLanguageId)
        ));
    }
}
