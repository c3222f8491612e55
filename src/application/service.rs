//! Ordered chain of translation sources consulted by the host application.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::domain::{Language, fallback_chain, normalize_lookup_key};

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "application::service";

/// Anything able to answer `translate(key, language)`.
pub trait TranslationSource: Send + Sync {
    fn name(&self) -> &str;

    /// The translation for `key`, after the source's own language fallback.
    fn translate(&self, key: &str, language: &str) -> Option<String>;

    fn available_languages(&self) -> Vec<Language>;
}

/// The lookup chain. The first source with a hit wins.
#[derive(Default)]
pub struct LocalizationService {
    sources: RwLock<Vec<Arc<dyn TranslationSource>>>,
}

impl LocalizationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain that starts out with the host application's own source.
    pub fn with_default(source: Arc<dyn TranslationSource>) -> Self {
        Self {
            sources: RwLock::new(vec![source]),
        }
    }

    /// Register `source` ahead of every other source.
    pub fn insert_provider(&self, source: Arc<dyn TranslationSource>) {
        let mut sources = rw_write(&self.sources, SOURCE, "insert_provider");
        if remove_named(&mut sources, source.name()).is_some() {
            warn!(provider = source.name(), "Replacing translation provider with the same name");
        }
        info!(provider = source.name(), position = 0, "Translation provider registered");
        sources.insert(0, source);
    }

    /// Register `source` behind every other source.
    pub fn add_provider(&self, source: Arc<dyn TranslationSource>) {
        let mut sources = rw_write(&self.sources, SOURCE, "add_provider");
        if remove_named(&mut sources, source.name()).is_some() {
            warn!(provider = source.name(), "Replacing translation provider with the same name");
        }
        info!(
            provider = source.name(),
            position = sources.len(),
            "Translation provider registered"
        );
        sources.push(source);
    }

    pub fn remove_provider(&self, name: &str) -> Option<Arc<dyn TranslationSource>> {
        let mut sources = rw_write(&self.sources, SOURCE, "remove_provider");
        let removed = remove_named(&mut sources, name);
        if removed.is_some() {
            info!(provider = name, "Translation provider removed");
        }
        removed
    }

    pub fn provider_names(&self) -> Vec<String> {
        rw_read(&self.sources, SOURCE, "provider_names")
            .iter()
            .map(|source| source.name().to_string())
            .collect()
    }

    pub fn translate(&self, key: &str, language: &str) -> Option<String> {
        let sources = rw_read(&self.sources, SOURCE, "translate").clone();
        for source in sources {
            if let Some(text) = source.translate(key, language) {
                debug!(provider = source.name(), key, language, "Translation served");
                return Some(text);
            }
        }
        debug!(key, language, "Translation missing from every provider");
        None
    }

    /// Languages offered by any registered source, first occurrence wins.
    pub fn available_languages(&self) -> Vec<Language> {
        let sources = rw_read(&self.sources, SOURCE, "available_languages").clone();
        let mut languages: Vec<Language> = Vec::new();
        for language in sources.iter().flat_map(|source| source.available_languages()) {
            if !languages.iter().any(|seen| seen.matches(&language.code)) {
                languages.push(language);
            }
        }
        languages
    }
}

fn remove_named(
    sources: &mut Vec<Arc<dyn TranslationSource>>,
    name: &str,
) -> Option<Arc<dyn TranslationSource>> {
    let index = sources.iter().position(|source| source.name() == name)?;
    Some(sources.remove(index))
}

/// Fixed translations supplied by the host application.
#[derive(Debug, Clone)]
pub struct StaticTranslations {
    name: String,
    master: Language,
    languages: Vec<Language>,
    entries: HashMap<String, HashMap<String, String>>,
}

impl StaticTranslations {
    pub fn new(name: impl Into<String>, master: Language) -> Self {
        Self {
            name: name.into(),
            languages: vec![master.clone()],
            master,
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, language: &Language, key: &str, text: impl Into<String>) -> Self {
        self.insert(language, key, text);
        self
    }

    pub fn insert(&mut self, language: &Language, key: &str, text: impl Into<String>) {
        if !self.languages.iter().any(|seen| seen.matches(&language.code)) {
            self.languages.push(language.clone());
        }
        self.entries
            .entry(language.code.to_ascii_lowercase())
            .or_default()
            .insert(normalize_lookup_key(key), text.into());
    }
}

impl TranslationSource for StaticTranslations {
    fn name(&self) -> &str {
        &self.name
    }

    fn translate(&self, key: &str, language: &str) -> Option<String> {
        let key = normalize_lookup_key(key);
        fallback_chain(language, &self.master.code)
            .iter()
            .find_map(|code| self.entries.get(code)?.get(&key).cloned())
    }

    fn available_languages(&self) -> Vec<Language> {
        self.languages.clone()
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

    fn source(name: &str, key: &str, text: &str) -> Arc<dyn TranslationSource> {
        Arc::new(StaticTranslations::new(name, english()).with(&english(), key, text))
    }

    #[test]
    fn static_translations_fall_back_to_master() {
        let translations = StaticTranslations::new("default", english())
            .with(&english(), "/greeting", "Hello")
            .with(&french(), "/farewell", "Au revoir");

        assert_eq!(translations.translate("greeting", "fr").as_deref(), Some("Hello"));
        assert_eq!(translations.translate("/farewell", "FR-ca").as_deref(), Some("Au revoir"));
        assert_eq!(translations.translate("missingkey", "en"), None);
        assert_eq!(translations.available_languages(), vec![english(), french()]);
    }

    #[test]
    fn primary_provider_is_consulted_first() {
        let service = LocalizationService::with_default(source("default", "/title", "Default"));
        service.insert_provider(source("content", "/title", "From content"));

        assert_eq!(service.translate("/title", "en").as_deref(), Some("From content"));
        assert_eq!(service.provider_names(), vec!["content", "default"]);
    }

    #[test]
    fn fallback_provider_only_fills_misses() {
        let service = LocalizationService::with_default(source("default", "/title", "Default"));
        service.add_provider(source("content", "/subtitle", "From content"));

        assert_eq!(service.translate("/title", "en").as_deref(), Some("Default"));
        assert_eq!(service.translate("/subtitle", "en").as_deref(), Some("From content"));
        assert_eq!(service.translate("/nothing", "en"), None);
    }

    #[test]
    fn re_registering_replaces_by_name() {
        let service = LocalizationService::new();
        service.add_provider(source("content", "/a", "old"));
        service.insert_provider(source("content", "/a", "new"));

        assert_eq!(service.provider_names(), vec!["content"]);
        assert_eq!(service.translate("/a", "en").as_deref(), Some("new"));
    }

    #[test]
    fn remove_provider_restores_chain() {
        let service = LocalizationService::with_default(source("default", "/title", "Default"));
        service.insert_provider(source("content", "/title", "From content"));

        assert!(service.remove_provider("content").is_some());
        assert!(service.remove_provider("content").is_none());
        assert_eq!(service.translate("/title", "en").as_deref(), Some("Default"));
    }
}
