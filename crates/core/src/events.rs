//! In-process event bus.
//!
//! Components publish [`LiveEvent`]s describing state changes; the screen sync
//! hub and the dashboard WebSocket subscribe. Delivery is best-effort: a
//! publish with no subscribers is dropped, and a slow subscriber observes
//! `RecvError::Lagged` rather than blocking the publisher.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::explain::{CountdownState, CyclePhase};

/// Default channel capacity for [`BroadcastBus`].
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Orchestrator state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A session became the active session.
    SessionActivated { session_id: String },
    /// The active session has no session anymore (deleted).
    SessionCleared,
    /// Ingestion appended products to a session.
    ProductsAppended {
        session_id: String,
        added: usize,
        total: usize,
    },
    /// Narration scripts were replaced.
    ScriptsUpdated { session_id: String, count: usize },
    /// The narration controller changed phase.
    PhaseChanged {
        phase: CyclePhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product_id: Option<String>,
    },
    /// The narration pointer moved.
    ScriptIndexChanged { index: usize },
    /// A countdown started, stopped, paused or resumed.
    CountdownChanged { countdown: CountdownState },
    /// Something the operator should see (rate limits, chain failures).
    Notice { level: NoticeLevel, message: String },
}

impl LiveEvent {
    /// Stable event name, used as the bus topic.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::SessionActivated { .. } => "session_activated",
            LiveEvent::SessionCleared => "session_cleared",
            LiveEvent::ProductsAppended { .. } => "products_appended",
            LiveEvent::ScriptsUpdated { .. } => "scripts_updated",
            LiveEvent::PhaseChanged { .. } => "phase_changed",
            LiveEvent::ScriptIndexChanged { .. } => "script_index_changed",
            LiveEvent::CountdownChanged { .. } => "countdown_changed",
            LiveEvent::Notice { .. } => "notice",
        }
    }

    /// Convenience constructor for a warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        LiveEvent::Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    /// Named JSON payload, as forwarded to out-of-process listeners.
    pub fn to_named_payload(&self) -> NamedPayload {
        NamedPayload {
            name: self.name().to_string(),
            payload: serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// A named, JSON-serializable bus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedPayload {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Publish/subscribe abstraction. Transport is up to the implementation.
pub trait EventBus<E>: Send + Sync {
    /// Publish an event to all current subscribers. Never blocks.
    fn publish(&self, event: E);

    /// Subscribe to events published after this call.
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-process bus backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> BroadcastBus<E> {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for BroadcastBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl<E: Clone + Send + Sync + 'static> EventBus<E> for BroadcastBus<E> {
    fn publish(&self, event: E) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}
