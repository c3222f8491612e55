//! Content-backed localization provider.
//!
//! Owns the live [`LoadedTranslations`] behind an atomic swap. Readers take a
//! single snapshot per lookup, so a lookup racing a reload sees either the
//! old table or the new one, never a mix.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::domain::Language;

use super::languages::resolve_available_languages;
use super::repos::{ContentTreeAccessor, SettingsResolver};
use super::serializer::{DocumentOrigin, TranslationDocument, TranslationTreeSerializer};
use super::service::TranslationSource;
use super::table::TranslationTable;

pub const DEFAULT_PROVIDER_NAME: &str = "ContentXmlLocalizationProvider";

const METRIC_HIT: &str = "glossa_translation_hit_total";
const METRIC_MISS: &str = "glossa_translation_miss_total";

/// Static identity of a provider instance.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub name: String,
    pub site_id: String,
    pub master: Language,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_NAME.to_string(),
            site_id: "default".to_string(),
            master: Language::new("en", "English", "English"),
        }
    }
}

/// One complete load: the document, its parsed table and its languages.
#[derive(Debug)]
pub struct LoadedTranslations {
    pub generation: u64,
    pub languages: Vec<Language>,
    pub table: TranslationTable,
    pub document: TranslationDocument,
    pub loaded_at: OffsetDateTime,
}

/// What a load did to the served table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A new table was installed.
    Fresh { generation: u64 },
    /// The load failed and the previous table stays in service.
    RetainedPrevious,
    /// The load failed with nothing to retain; an empty table is served.
    EmptyFallback,
}

impl LoadOutcome {
    pub fn label(self) -> &'static str {
        match self {
            LoadOutcome::Fresh { .. } => "fresh",
            LoadOutcome::RetainedPrevious => "retained_previous",
            LoadOutcome::EmptyFallback => "empty_fallback",
        }
    }
}

pub struct ContentLocalizationProvider {
    options: ProviderOptions,
    accessor: Arc<dyn ContentTreeAccessor>,
    settings: Arc<dyn SettingsResolver>,
    serializer: TranslationTreeSerializer,
    current: ArcSwapOption<LoadedTranslations>,
    generation: AtomicU64,
}

impl ContentLocalizationProvider {
    pub fn new(
        options: ProviderOptions,
        accessor: Arc<dyn ContentTreeAccessor>,
        settings: Arc<dyn SettingsResolver>,
    ) -> Self {
        Self {
            serializer: TranslationTreeSerializer::new(accessor.clone()),
            options,
            accessor,
            settings,
            current: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Rebuild the table from the content tree and swap it in.
    ///
    /// Never fails: store and document errors keep the previous table, or
    /// install an empty one when there is nothing to keep.
    pub async fn load(&self) -> LoadOutcome {
        let site_id = self.options.site_id.as_str();
        let root = match self.settings.get_translation_root(site_id).await {
            Ok(root) => root,
            Err(err) => {
                error!(
                    provider = %self.options.name,
                    site_id,
                    error = %err,
                    transient = err.is_transient(),
                    "Failed to resolve translation root"
                );
                return self.fail();
            }
        };

        let Some(root) = root else {
            warn!(
                provider = %self.options.name,
                site_id,
                "No translation root configured; serving empty translations"
            );
            return self.install(TranslationTable::default(), Vec::new(), TranslationDocument::empty());
        };

        let languages =
            resolve_available_languages(self.accessor.as_ref(), root.id, &self.options.master).await;
        let document = self.serializer.serialize(root.id, &languages).await;
        if document.is_fallback() {
            return self.fail();
        }

        match TranslationTable::parse(document.as_str()) {
            Ok(table) => self.install(table, languages, document),
            Err(err) => {
                error!(
                    provider = %self.options.name,
                    error = %err,
                    "Rendered translation document failed to parse"
                );
                self.fail()
            }
        }
    }

    fn install(
        &self,
        table: TranslationTable,
        languages: Vec<Language>,
        document: TranslationDocument,
    ) -> LoadOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            provider = %self.options.name,
            generation,
            languages = languages.len(),
            entries = table.entry_count(),
            "Translations loaded"
        );
        self.current.store(Some(Arc::new(LoadedTranslations {
            generation,
            languages,
            table,
            document,
            loaded_at: OffsetDateTime::now_utc(),
        })));
        LoadOutcome::Fresh { generation }
    }

    fn fail(&self) -> LoadOutcome {
        if let Some(previous) = self.current.load_full() {
            warn!(
                provider = %self.options.name,
                generation = previous.generation,
                "Reload failed; keeping previously loaded translations"
            );
            return LoadOutcome::RetainedPrevious;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            provider = %self.options.name,
            generation,
            "Initial load failed; serving empty translations until the next reload"
        );
        self.current.store(Some(Arc::new(LoadedTranslations {
            generation,
            languages: Vec::new(),
            table: TranslationTable::default(),
            document: TranslationDocument::fallback(),
            loaded_at: OffsetDateTime::now_utc(),
        })));
        LoadOutcome::EmptyFallback
    }

    /// Discard the live table.
    pub fn unload(&self) {
        if self.current.swap(None).is_some() {
            info!(provider = %self.options.name, "Translations unloaded");
        }
    }

    /// The table currently being served, if any.
    pub fn snapshot(&self) -> Option<Arc<LoadedTranslations>> {
        self.current.load_full()
    }

    /// Generation of the served table, 0 before the first load.
    pub fn generation(&self) -> u64 {
        self.current
            .load()
            .as_ref()
            .map_or(0, |loaded| loaded.generation)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn document_origin(&self) -> Option<DocumentOrigin> {
        self.current
            .load()
            .as_ref()
            .map(|loaded| loaded.document.origin())
    }
}

impl TranslationSource for ContentLocalizationProvider {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn translate(&self, key: &str, language: &str) -> Option<String> {
        let current = self.current.load();
        let hit = current.as_ref().and_then(|loaded| {
            loaded
                .table
                .lookup(key, language, &self.options.master.code)
        });

        match hit {
            Some((text, served)) => {
                counter!(METRIC_HIT).increment(1);
                if !served.eq_ignore_ascii_case(language) {
                    debug!(key, language, served, "Translation served from fallback language");
                }
                Some(text.to_string())
            }
            None => {
                counter!(METRIC_MISS).increment(1);
                debug!(key, language, "Translation miss");
                None
            }
        }
    }

    fn available_languages(&self) -> Vec<Language> {
        self.current
            .load()
            .as_ref()
            .map(|loaded| loaded.languages.clone())
            .unwrap_or_default()
    }
}
