//! Change notifications consumed by the invalidation coordinator.
//!
//! Two independent sources feed reloads: content mutations raised inside this
//! process, and the deployment-wide "translations changed" signal raised by
//! any process. Both are plain broadcast subscriptions so they can be faked
//! in tests.

use std::fmt;

use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{ContentId, NodeTag};

/// What happened to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEventKind {
    Published,
    Moved { from: Option<ContentId> },
    Deleted,
    DeletedLanguage { language: String },
}

/// A content mutation observed in this process.
#[derive(Debug, Clone)]
pub struct ContentEvent {
    pub id: Uuid,
    pub kind: ContentEventKind,
    pub content: ContentId,
    pub content_tag: NodeTag,
    pub timestamp: OffsetDateTime,
}

impl ContentEvent {
    pub fn new(kind: ContentEventKind, content: ContentId, content_tag: NodeTag) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content,
            content_tag,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Whether this mutation can change the served translations.
    pub fn affects_translations(&self) -> bool {
        self.content_tag.affects_translations()
    }
}

/// Identity of the process raising a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginatorId(pub Uuid);

impl OriginatorId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OriginatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Deployment-wide notification that translations were reloaded somewhere.
#[derive(Debug, Clone)]
pub struct TranslationsChanged {
    pub id: Uuid,
    pub originator: OriginatorId,
    pub message: String,
    pub raised_at: OffsetDateTime,
}

impl TranslationsChanged {
    pub fn new(originator: OriginatorId, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            originator,
            message: message.into(),
            raised_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("signal bus has no subscribers")]
    NoSubscribers,
}

/// Source of local content mutation events.
pub trait ContentEventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ContentEvent>;
}

/// Fire-and-forget, at-least-once signal channel shared by the deployment.
pub trait SignalBus: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<TranslationsChanged>;

    fn publish(&self, signal: TranslationsChanged) -> Result<(), SignalError>;
}
