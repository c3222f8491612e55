//! In-memory lookup table built from a translation document.

use std::collections::HashMap;

use quick_xml::{
    Reader,
    encoding::Decoder,
    escape::resolve_predefined_entity,
    events::{BytesRef, BytesStart, Event},
};
use thiserror::Error;

use crate::domain::{Language, fallback_chain, normalize_lookup_key};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("malformed translation document: {0}")]
    Malformed(String),
    #[error("unexpected element `{found}`, expected `{expected}`")]
    UnexpectedElement { expected: &'static str, found: String },
    #[error("`language` element without an `id` attribute")]
    MissingLanguageId,
}

#[derive(Debug, Clone)]
struct LanguageEntries {
    language: Language,
    entries: HashMap<String, String>,
}

/// Per-language map of `container/.../item` paths to translated text.
#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    languages: Vec<LanguageEntries>,
}

struct Frame {
    name: String,
    text: String,
    has_children: bool,
}

#[derive(Default)]
struct TableBuilder {
    table: TranslationTable,
    seen_root: bool,
    /// Index of the `language` element being read.
    current: Option<usize>,
    stack: Vec<Frame>,
}

impl TableBuilder {
    fn open(
        &mut self,
        start: &BytesStart<'_>,
        self_closing: bool,
        decoder: Decoder,
    ) -> Result<(), TableError> {
        let name = element_name(start.name().as_ref())?;

        if !self.seen_root {
            if name != "languages" {
                return Err(TableError::UnexpectedElement {
                    expected: "languages",
                    found: name,
                });
            }
            self.seen_root = true;
            return Ok(());
        }

        if self.current.is_none() {
            if name != "language" {
                return Err(TableError::UnexpectedElement {
                    expected: "language",
                    found: name,
                });
            }
            let mut code = None;
            let mut english_name = String::new();
            for attribute in start.attributes() {
                let attribute = attribute.map_err(|err| TableError::Malformed(err.to_string()))?;
                let value = attribute
                    .decode_and_unescape_value(decoder)
                    .map_err(|err| TableError::Malformed(err.to_string()))?;
                match attribute.key.as_ref() {
                    b"id" => code = Some(value.into_owned()),
                    b"name" => english_name = value.into_owned(),
                    _ => {}
                }
            }
            let code = code
                .filter(|code| !code.trim().is_empty())
                .ok_or(TableError::MissingLanguageId)?;
            let index = self.table.language_index(code, english_name);
            if !self_closing {
                self.current = Some(index);
            }
            return Ok(());
        }

        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
        }
        // A self-closing element is a container with nothing under it.
        if !self_closing {
            self.stack.push(Frame {
                name,
                text: String::new(),
                has_children: false,
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        match self.stack.pop() {
            Some(frame) => {
                if !frame.has_children
                    && let Some(index) = self.current
                {
                    let path = path_of(&self.stack, &frame.name);
                    self.table.languages[index].entries.insert(path, frame.text);
                }
            }
            // Closing `language` or `languages`.
            None => self.current = None,
        }
    }

    fn text(&mut self, content: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.text.push_str(content);
        }
    }

    fn finish(self) -> Result<TranslationTable, TableError> {
        if !self.seen_root {
            return Err(TableError::Malformed("document has no root element".to_string()));
        }
        Ok(self.table)
    }
}

impl TranslationTable {
    pub fn parse(xml: &str) -> Result<Self, TableError> {
        let mut reader = Reader::from_str(xml);
        let mut builder = TableBuilder::default();

        loop {
            let event = reader
                .read_event()
                .map_err(|err| TableError::Malformed(err.to_string()))?;
            match event {
                Event::Start(start) => builder.open(&start, false, reader.decoder())?,
                Event::Empty(start) => builder.open(&start, true, reader.decoder())?,
                Event::End(_) => builder.close(),
                Event::Text(text) => {
                    let content = text
                        .xml_content()
                        .map_err(|err| TableError::Malformed(err.to_string()))?;
                    builder.text(&content);
                }
                Event::CData(data) => {
                    builder.text(&String::from_utf8_lossy(data.into_inner().as_ref()));
                }
                Event::GeneralRef(reference) => {
                    builder.text(&resolve_reference(&reference).map_err(TableError::Malformed)?);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        builder.finish()
    }

    fn language_index(&mut self, code: String, english_name: String) -> usize {
        if let Some(index) = self
            .languages
            .iter()
            .position(|entry| entry.language.matches(&code))
        {
            return index;
        }
        self.languages.push(LanguageEntries {
            language: Language::new(code, english_name.clone(), english_name),
            entries: HashMap::new(),
        });
        self.languages.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Languages present in the document, in document order.
    pub fn languages(&self) -> impl Iterator<Item = &Language> {
        self.languages.iter().map(|entry| &entry.language)
    }

    pub fn entry_count(&self) -> usize {
        self.languages.iter().map(|entry| entry.entries.len()).sum()
    }

    /// Exact lookup without fallback.
    pub fn get(&self, language: &str, key: &str) -> Option<&str> {
        let key = normalize_lookup_key(key);
        self.entries_for(language)?.get(&key).map(String::as_str)
    }

    /// Resolve `key` for `language`, walking the fallback chain to `master`.
    ///
    /// Returns the text together with the language code that served it.
    pub fn lookup(&self, key: &str, language: &str, master: &str) -> Option<(&str, &str)> {
        let key = normalize_lookup_key(key);
        if key.is_empty() {
            return None;
        }
        fallback_chain(language, master).iter().find_map(|code| {
            let entry = self
                .languages
                .iter()
                .find(|entry| entry.language.matches(code))?;
            entry
                .entries
                .get(&key)
                .map(|text| (text.as_str(), entry.language.code.as_str()))
        })
    }

    /// Every key defined for `language`, sorted, in `/a/b` form.
    pub fn keys(&self, language: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries_for(language)
            .map(|entries| entries.keys().map(|key| format!("/{key}")).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn entries_for(&self, language: &str) -> Option<&HashMap<String, String>> {
        self.languages
            .iter()
            .find(|entry| entry.language.matches(language))
            .map(|entry| &entry.entries)
    }
}

/// Text of a character or predefined entity reference.
pub(crate) fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, String> {
    if let Some(ch) = reference.resolve_char_ref().map_err(|err| err.to_string())? {
        return Ok(ch.to_string());
    }
    let entity = reference.decode().map_err(|err| err.to_string())?;
    resolve_predefined_entity(&entity)
        .map(str::to_string)
        .ok_or_else(|| format!("unknown entity `&{entity};`"))
}

fn element_name(raw: &[u8]) -> Result<String, TableError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| TableError::Malformed(err.to_string()))
}

fn path_of(stack: &[Frame], leaf: &str) -> String {
    let mut segments: Vec<String> = stack
        .iter()
        .map(|frame| frame.name.to_ascii_lowercase())
        .collect();
    segments.push(leaf.to_ascii_lowercase());
    segments.join("/")
}
