//! Invalidation coordinator.
//!
//! Turns local content mutations and deployment-wide signals into provider
//! reloads. Reloads run one at a time per process; a request that arrives
//! while a reload is in flight is folded into the next reload instead of
//! walking the tree again for every queued event.
//!
//! Only locally triggered reloads are broadcast, and every process ignores
//! signals carrying its own originator id, so a change causes exactly one
//! reload per peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::events::{ContentEvent, OriginatorId, SignalBus, TranslationsChanged};
use super::lock::mutex_lock;
use super::provider::{ContentLocalizationProvider, LoadOutcome};

/// Message carried by every broadcast.
pub const RELOAD_MESSAGE: &str = "[Localization] Translation updated.";

const SOURCE: &str = "application::coordinator";
const METRIC_RELOADS: &str = "glossa_reload_total";
const METRIC_RELOAD_MS: &str = "glossa_reload_ms";
const METRIC_SIGNAL_IGNORED: &str = "glossa_signal_ignored_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Disabled,
    Loaded,
    Reloading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The trigger did not call for a reload.
    Ignored,
    /// A reload that started after the request already covered it.
    Coalesced,
    Reloaded(LoadOutcome),
}

pub struct InvalidationCoordinator {
    provider: Arc<ContentLocalizationProvider>,
    bus: Arc<dyn SignalBus>,
    originator: OriginatorId,
    reload_lock: tokio::sync::Mutex<()>,
    requested: AtomicU64,
    completed: AtomicU64,
    state: Mutex<CoordinatorState>,
}

impl InvalidationCoordinator {
    pub fn new(
        provider: Arc<ContentLocalizationProvider>,
        bus: Arc<dyn SignalBus>,
        originator: OriginatorId,
    ) -> Self {
        Self {
            provider,
            bus,
            originator,
            reload_lock: tokio::sync::Mutex::new(()),
            requested: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            state: Mutex::new(CoordinatorState::Uninitialized),
        }
    }

    pub fn originator(&self) -> OriginatorId {
        self.originator
    }

    pub fn provider(&self) -> &Arc<ContentLocalizationProvider> {
        &self.provider
    }

    pub fn state(&self) -> CoordinatorState {
        *mutex_lock(&self.state, SOURCE, "state")
    }

    fn set_state(&self, state: CoordinatorState) {
        *mutex_lock(&self.state, SOURCE, "set_state") = state;
    }

    fn is_active(&self) -> bool {
        matches!(
            self.state(),
            CoordinatorState::Loaded | CoordinatorState::Reloading
        )
    }

    /// Initial load. Moves `Uninitialized` to `Loaded` whatever the outcome.
    pub async fn initialize(&self) -> LoadOutcome {
        let _guard = self.reload_lock.lock().await;
        let target = self.requested.load(Ordering::SeqCst);
        let outcome = self.timed_load().await;
        self.completed.store(target, Ordering::SeqCst);
        self.set_state(CoordinatorState::Loaded);
        info!(
            originator = %self.originator,
            outcome = outcome.label(),
            "Localization coordinator initialized"
        );
        outcome
    }

    /// Wait for any reload in flight, then drop the live table.
    pub async fn teardown(&self) {
        let _guard = self.reload_lock.lock().await;
        self.provider.unload();
        self.set_state(CoordinatorState::Uninitialized);
        info!(originator = %self.originator, "Localization coordinator torn down");
    }

    /// React to a content mutation in this process.
    pub async fn handle_content_event(&self, event: &ContentEvent) -> ReloadOutcome {
        if !event.affects_translations() {
            debug!(
                event_id = %event.id,
                content = %event.content,
                tag = ?event.content_tag,
                "Content event does not affect translations"
            );
            return ReloadOutcome::Ignored;
        }

        debug!(
            event_id = %event.id,
            content = %event.content,
            kind = ?event.kind,
            "Translation content changed"
        );
        self.reload_and_broadcast().await
    }

    /// React to a deployment-wide signal.
    pub async fn handle_signal(&self, signal: &TranslationsChanged) -> ReloadOutcome {
        if signal.originator == self.originator {
            counter!(METRIC_SIGNAL_IGNORED).increment(1);
            debug!(signal_id = %signal.id, "Ignoring signal raised by this process");
            return ReloadOutcome::Ignored;
        }

        debug!(
            signal_id = %signal.id,
            originator = %signal.originator,
            message = %signal.message,
            "Translations changed on a peer"
        );
        self.reload().await
    }

    /// Reload, then tell peers, even when the reload was coalesced.
    pub async fn reload_and_broadcast(&self) -> ReloadOutcome {
        let outcome = self.reload().await;
        if outcome != ReloadOutcome::Ignored {
            self.broadcast();
        }
        outcome
    }

    /// Reload without telling peers.
    pub async fn reload(&self) -> ReloadOutcome {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.reload_lock.lock().await;

        if !self.is_active() {
            debug!(ticket, state = ?self.state(), "Reload skipped; coordinator not active");
            return ReloadOutcome::Ignored;
        }

        if self.completed.load(Ordering::SeqCst) >= ticket {
            counter!(METRIC_RELOADS, "outcome" => "coalesced").increment(1);
            debug!(ticket, "Reload request already covered");
            return ReloadOutcome::Coalesced;
        }

        let target = self.requested.load(Ordering::SeqCst);
        self.set_state(CoordinatorState::Reloading);
        let outcome = self.timed_load().await;
        self.completed.store(target, Ordering::SeqCst);
        self.set_state(CoordinatorState::Loaded);

        info!(
            ticket,
            covered = target,
            outcome = outcome.label(),
            generation = self.provider.generation(),
            "Translations reloaded"
        );
        ReloadOutcome::Reloaded(outcome)
    }

    async fn timed_load(&self) -> LoadOutcome {
        let started_at = Instant::now();
        let outcome = self.provider.load().await;
        histogram!(METRIC_RELOAD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        counter!(METRIC_RELOADS, "outcome" => outcome.label()).increment(1);
        outcome
    }

    fn broadcast(&self) {
        let signal = TranslationsChanged::new(self.originator, RELOAD_MESSAGE);
        let signal_id = signal.id;
        match self.bus.publish(signal) {
            Ok(()) => debug!(signal_id = %signal_id, "Translations changed signal raised"),
            Err(err) => warn!(
                signal_id = %signal_id,
                error = %err,
                "Failed to raise translations changed signal"
            ),
        }
    }

    /// Consume local content events until the source closes.
    ///
    /// Missed events are treated as a local change.
    pub async fn listen_content_events(
        self: Arc<Self>,
        mut events: broadcast::Receiver<ContentEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle_content_event(&event).await;
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Content event stream lagged; reloading");
                    self.reload_and_broadcast().await;
                }
                Err(RecvError::Closed) => {
                    debug!("Content event stream closed");
                    break;
                }
            }
        }
    }

    /// Consume deployment signals until the bus closes.
    ///
    /// Missed signals trigger a silent reload.
    pub async fn listen_signals(
        self: Arc<Self>,
        mut signals: broadcast::Receiver<TranslationsChanged>,
    ) {
        loop {
            match signals.recv().await {
                Ok(signal) => {
                    self.handle_signal(&signal).await;
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Signal stream lagged; reloading");
                    self.reload().await;
                }
                Err(RecvError::Closed) => {
                    debug!("Signal stream closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::future::join_all;

    use super::*;
    use crate::application::events::ContentEventKind;
    use crate::application::provider::ProviderOptions;
    use crate::application::repos::{ContentTreeAccessor, StoreError};
    use crate::domain::{ContentId, ContentNode, Language, NodeTag};
    use crate::infra::events::LocalSignalBus;
    use crate::infra::memory::MemoryContentTree;

    fn english() -> Language {
        Language::new("en", "English", "English")
    }

    fn seeded() -> Arc<MemoryContentTree> {
        let tree = Arc::new(MemoryContentTree::new(english()));
        let start = tree.create_settings(None, "Start", None).unwrap();
        let root = tree.create_container(Some(start), "Translations").unwrap();
        tree.set_translation_root(start, Some(root)).unwrap();
        tree.assign_site("default", start).unwrap();
        let hello = tree.create_item(root, "Hello").unwrap();
        tree.set_translation(hello, "en", "Hi").unwrap();
        tree
    }

    fn coordinator_over(
        accessor: Arc<dyn ContentTreeAccessor>,
        tree: &Arc<MemoryContentTree>,
        bus: &Arc<LocalSignalBus>,
    ) -> InvalidationCoordinator {
        let provider = Arc::new(ContentLocalizationProvider::new(
            ProviderOptions::default(),
            accessor,
            tree.clone(),
        ));
        InvalidationCoordinator::new(provider, bus.clone(), OriginatorId::generate())
    }

    fn coordinator(tree: &Arc<MemoryContentTree>, bus: &Arc<LocalSignalBus>) -> InvalidationCoordinator {
        coordinator_over(tree.clone(), tree, bus)
    }

    fn item_event() -> ContentEvent {
        ContentEvent::new(ContentEventKind::Published, ContentId(99), NodeTag::TranslationItem)
    }

    #[tokio::test]
    async fn local_event_reloads_and_broadcasts() {
        let tree = seeded();
        let bus = Arc::new(LocalSignalBus::new(16));
        let mut signals = bus.subscribe();
        let coordinator = coordinator(&tree, &bus);
        coordinator.initialize().await;

        let outcome = coordinator.handle_content_event(&item_event()).await;

        assert_eq!(outcome, ReloadOutcome::Reloaded(LoadOutcome::Fresh { generation: 2 }));
        let signal = signals.try_recv().expect("broadcast signal");
        assert_eq!(signal.originator, coordinator.originator());
        assert_eq!(signal.message, RELOAD_MESSAGE);
        assert_eq!(coordinator.state(), CoordinatorState::Loaded);
    }

    #[tokio::test]
    async fn unrelated_content_is_ignored() {
        let tree = seeded();
        let bus = Arc::new(LocalSignalBus::new(16));
        let mut signals = bus.subscribe();
        let coordinator = coordinator(&tree, &bus);
        coordinator.initialize().await;

        let event = ContentEvent::new(ContentEventKind::Deleted, ContentId(5), NodeTag::Generic);
        assert_eq!(coordinator.handle_content_event(&event).await, ReloadOutcome::Ignored);
        assert_eq!(coordinator.provider().generation(), 1);
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn own_signal_is_ignored() {
        let tree = seeded();
        let bus = Arc::new(LocalSignalBus::new(16));
        let coordinator = coordinator(&tree, &bus);
        coordinator.initialize().await;

        let echo = TranslationsChanged::new(coordinator.originator(), RELOAD_MESSAGE);
        assert_eq!(coordinator.handle_signal(&echo).await, ReloadOutcome::Ignored);
        assert_eq!(coordinator.provider().generation(), 1);
    }

    #[tokio::test]
    async fn foreign_signal_reloads_without_broadcast() {
        let tree = seeded();
        let bus = Arc::new(LocalSignalBus::new(16));
        let mut signals = bus.subscribe();
        let coordinator = coordinator(&tree, &bus);
        coordinator.initialize().await;

        let peer = TranslationsChanged::new(OriginatorId::generate(), RELOAD_MESSAGE);
        let outcome = coordinator.handle_signal(&peer).await;

        assert!(matches!(outcome, ReloadOutcome::Reloaded(LoadOutcome::Fresh { .. })));
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn events_before_initialize_are_ignored() {
        let tree = seeded();
        let bus = Arc::new(LocalSignalBus::new(16));
        let coordinator = coordinator(&tree, &bus);

        assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);
        assert_eq!(
            coordinator.handle_content_event(&item_event()).await,
            ReloadOutcome::Ignored
        );
        assert!(!coordinator.provider().is_loaded());
    }

    #[tokio::test]
    async fn teardown_discards_table() {
        let tree = seeded();
        let bus = Arc::new(LocalSignalBus::new(16));
        let coordinator = coordinator(&tree, &bus);
        coordinator.initialize().await;

        coordinator.teardown().await;
        assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);
        assert!(!coordinator.provider().is_loaded());
        assert_eq!(coordinator.reload().await, ReloadOutcome::Ignored);
    }

    /// Yields once per child listing so concurrent reloads interleave.
    struct Yielding(Arc<MemoryContentTree>);

    #[async_trait]
    impl ContentTreeAccessor for Yielding {
        async fn get_children(
            &self,
            node: ContentId,
            language: &Language,
        ) -> Result<Vec<ContentNode>, StoreError> {
            tokio::task::yield_now().await;
            self.0.get_children(node, language).await
        }

        async fn get_language_variants(&self, node: ContentId) -> Result<Vec<Language>, StoreError> {
            self.0.get_language_variants(node).await
        }

        async fn get_ancestors(&self, node: ContentId) -> Result<Vec<ContentNode>, StoreError> {
            self.0.get_ancestors(node).await
        }

        async fn get(&self, node: ContentId) -> Result<ContentNode, StoreError> {
            self.0.get(node).await
        }
    }

    #[tokio::test]
    async fn concurrent_requests_are_coalesced() {
        let tree = seeded();
        let bus = Arc::new(LocalSignalBus::new(16));
        let coordinator = coordinator_over(Arc::new(Yielding(tree.clone())), &tree, &bus);
        coordinator.initialize().await;

        let outcomes = join_all((0..4).map(|_| coordinator.reload())).await;

        let reloaded = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ReloadOutcome::Reloaded(_)))
            .count();
        let coalesced = outcomes
            .iter()
            .filter(|outcome| **outcome == ReloadOutcome::Coalesced)
            .count();
        assert_eq!(reloaded + coalesced, 4);
        assert!(coalesced >= 1, "expected coalescing, got {outcomes:?}");
        assert!(reloaded >= 1);
        assert_eq!(coordinator.provider().generation(), 1 + reloaded as u64);
    }
}
