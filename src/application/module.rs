//! Startup and teardown of the content localization feature.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::coordinator::{CoordinatorState, InvalidationCoordinator};
use super::events::{ContentEventSource, OriginatorId, SignalBus};
use super::provider::{ContentLocalizationProvider, LoadOutcome, ProviderOptions};
use super::repos::{ContentTreeAccessor, SettingsResolver};
use super::service::LocalizationService;

#[derive(Debug, Clone, Default)]
pub struct ModuleOptions {
    pub enabled: bool,
    /// Consult this provider before every other source.
    pub is_primary_provider: bool,
    pub provider: ProviderOptions,
    /// Fixed originator id; a fresh one is generated when absent.
    pub originator: Option<OriginatorId>,
}

/// Collaborators the module wires together.
#[derive(Clone)]
pub struct LocalizationDeps {
    pub accessor: Arc<dyn ContentTreeAccessor>,
    pub settings: Arc<dyn SettingsResolver>,
    pub content_events: Arc<dyn ContentEventSource>,
    pub bus: Arc<dyn SignalBus>,
    pub service: Arc<LocalizationService>,
}

pub struct LocalizationModule {
    service: Arc<LocalizationService>,
    coordinator: Option<Arc<InvalidationCoordinator>>,
    listeners: Vec<JoinHandle<()>>,
    idle_state: CoordinatorState,
    initial_load: Option<LoadOutcome>,
}

impl LocalizationModule {
    /// Bring the feature up. Must be called inside a tokio runtime.
    ///
    /// A disabled module touches nothing: no provider is registered and no
    /// subscription is made.
    pub async fn initialize(options: ModuleOptions, deps: LocalizationDeps) -> Self {
        if !options.enabled {
            info!("Content localization disabled; default translations stay in effect");
            return Self {
                service: deps.service,
                coordinator: None,
                listeners: Vec::new(),
                idle_state: CoordinatorState::Disabled,
                initial_load: None,
            };
        }

        let provider = Arc::new(ContentLocalizationProvider::new(
            options.provider,
            deps.accessor,
            deps.settings,
        ));
        let originator = options.originator.unwrap_or_else(OriginatorId::generate);
        let coordinator = Arc::new(InvalidationCoordinator::new(
            provider.clone(),
            deps.bus.clone(),
            originator,
        ));

        // Subscribe first so changes made during the initial load still arrive.
        let content_events = deps.content_events.subscribe();
        let signals = deps.bus.subscribe();

        let initial_load = coordinator.initialize().await;

        if options.is_primary_provider {
            deps.service.insert_provider(provider.clone());
        } else {
            deps.service.add_provider(provider.clone());
        }

        let listeners = vec![
            tokio::spawn(coordinator.clone().listen_content_events(content_events)),
            tokio::spawn(coordinator.clone().listen_signals(signals)),
        ];

        info!(
            provider = %provider.options().name,
            originator = %originator,
            primary = options.is_primary_provider,
            outcome = initial_load.label(),
            "Content localization initialized"
        );

        Self {
            service: deps.service,
            coordinator: Some(coordinator),
            listeners,
            idle_state: CoordinatorState::Uninitialized,
            initial_load: Some(initial_load),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.coordinator
            .as_ref()
            .map_or(self.idle_state, |coordinator| coordinator.state())
    }

    pub fn coordinator(&self) -> Option<&Arc<InvalidationCoordinator>> {
        self.coordinator.as_ref()
    }

    pub fn provider(&self) -> Option<&Arc<ContentLocalizationProvider>> {
        self.coordinator
            .as_ref()
            .map(|coordinator| coordinator.provider())
    }

    pub fn initial_load(&self) -> Option<LoadOutcome> {
        self.initial_load
    }

    pub fn service(&self) -> &Arc<LocalizationService> {
        &self.service
    }

    /// Stop listening, deregister the provider and drop its table.
    pub async fn shutdown(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
            if let Err(err) = listener.await
                && !err.is_cancelled()
            {
                debug!(error = %err, "Localization listener ended abnormally");
            }
        }

        if let Some(coordinator) = &self.coordinator {
            let name = coordinator.provider().options().name.clone();
            self.service.remove_provider(&name);
            coordinator.teardown().await;
        }
        self.idle_state = CoordinatorState::Uninitialized;
        info!("Content localization shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::service::{StaticTranslations, TranslationSource};
    use crate::domain::Language;
    use crate::infra::events::{ContentEventHub, LocalSignalBus};
    use crate::infra::memory::MemoryContentTree;

    fn english() -> Language {
        Language::new("en", "English", "English")
    }

    struct Fixture {
        tree: Arc<MemoryContentTree>,
        deps: LocalizationDeps,
    }

    fn fixture() -> Fixture {
        let hub = Arc::new(ContentEventHub::new(64));
        let tree = Arc::new(MemoryContentTree::new(english()).with_events(hub.clone()));
        let start = tree.create_settings(None, "Start", None).unwrap();
        let root = tree.create_container(Some(start), "Translations").unwrap();
        tree.set_translation_root(start, Some(root)).unwrap();
        tree.assign_site("default", start).unwrap();
        let title = tree.create_item(root, "Title").unwrap();
        tree.set_translation(title, "en", "From content").unwrap();

        let default: Arc<dyn TranslationSource> = Arc::new(
            StaticTranslations::new("default", english())
                .with(&english(), "/title", "Built in")
                .with(&english(), "/footer", "Footer"),
        );
        let deps = LocalizationDeps {
            accessor: tree.clone(),
            settings: tree.clone(),
            content_events: hub,
            bus: Arc::new(LocalSignalBus::new(64)),
            service: Arc::new(LocalizationService::with_default(default)),
        };
        Fixture { tree, deps }
    }

    fn enabled(primary: bool) -> ModuleOptions {
        ModuleOptions {
            enabled: true,
            is_primary_provider: primary,
            ..ModuleOptions::default()
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    #[tokio::test]
    async fn disabled_module_leaves_service_untouched() {
        let fixture = fixture();
        let module = LocalizationModule::initialize(ModuleOptions::default(), fixture.deps.clone()).await;

        assert_eq!(module.state(), CoordinatorState::Disabled);
        assert!(module.provider().is_none());
        assert_eq!(fixture.deps.service.provider_names(), vec!["default"]);
        assert_eq!(fixture.deps.service.translate("/title", "en").as_deref(), Some("Built in"));
    }

    #[tokio::test]
    async fn primary_provider_goes_first() {
        let fixture = fixture();
        let module = LocalizationModule::initialize(enabled(true), fixture.deps.clone()).await;

        assert_eq!(module.state(), CoordinatorState::Loaded);
        assert_eq!(
            fixture.deps.service.provider_names(),
            vec!["ContentXmlLocalizationProvider", "default"]
        );
        assert_eq!(
            fixture.deps.service.translate("/title", "en").as_deref(),
            Some("From content")
        );
        assert_eq!(fixture.deps.service.translate("/footer", "en").as_deref(), Some("Footer"));
    }

    #[tokio::test]
    async fn secondary_provider_goes_last() {
        let fixture = fixture();
        let _module = LocalizationModule::initialize(enabled(false), fixture.deps.clone()).await;

        assert_eq!(
            fixture.deps.service.provider_names(),
            vec!["default", "ContentXmlLocalizationProvider"]
        );
        assert_eq!(fixture.deps.service.translate("/title", "en").as_deref(), Some("Built in"));
    }

    #[tokio::test]
    async fn published_content_is_picked_up() {
        let fixture = fixture();
        let module = LocalizationModule::initialize(enabled(true), fixture.deps.clone()).await;
        let root = fixture.tree.find_by_name("Translations").unwrap();

        let item = fixture.tree.create_item(root, "Tagline").unwrap();
        fixture.tree.set_translation(item, "en", "Fresh").unwrap();

        let service = fixture.deps.service.clone();
        assert!(eventually(|| service.translate("/tagline", "en").is_some()).await);
        assert!(module.provider().unwrap().generation() > 1);
    }

    #[tokio::test]
    async fn shutdown_deregisters_and_unloads() {
        let fixture = fixture();
        let mut module = LocalizationModule::initialize(enabled(true), fixture.deps.clone()).await;
        let provider = module.provider().unwrap().clone();

        module.shutdown().await;

        assert_eq!(module.state(), CoordinatorState::Uninitialized);
        assert_eq!(fixture.deps.service.provider_names(), vec!["default"]);
        assert!(!provider.is_loaded());
    }
}
