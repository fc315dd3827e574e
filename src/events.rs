//! Pipeline event system
//!
//! Provides event definitions and the EventBus assessment sessions
//! broadcast on. Status polling never depends on the bus; it exists so
//! observers (UIs, log sinks, tests) can follow a session without
//! polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::SessionState;
use crate::reports::ReportFormat;

/// Pipeline event types
///
/// Events are broadcast via EventBus and can be serialized for
/// transmission to external observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Session moved to a new lifecycle state
    ///
    /// Emitted for every transition, including the terminal ones.
    SessionStateChanged {
        session_id: Uuid,
        /// State before the transition
        old_state: SessionState,
        /// State after the transition
        new_state: SessionState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress update within the current state
    ///
    /// Emitted at stage entry and periodically inside long stages.
    /// Non-critical; dropped silently when nobody is subscribed.
    SessionProgress {
        session_id: Uuid,
        state: SessionState,
        /// Completion percentage (0-100)
        percent: u8,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A report artifact was rendered and stored
    ArtifactWritten {
        session_id: Uuid,
        format: ReportFormat,
        file_name: String,
        size_bytes: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The cleanup sweeper expired a session and deleted its artifacts
    SessionExpired {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PipelineEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            PipelineEvent::SessionStateChanged { session_id, .. }
            | PipelineEvent::SessionProgress { session_id, .. }
            | PipelineEvent::ArtifactWritten { session_id, .. }
            | PipelineEvent::SessionExpired { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast channel for pipeline events
///
/// Wraps tokio's broadcast channel. Cloning the bus is cheap and all
/// clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use vmbom::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used for progress updates and other events where it is acceptable
    /// that no component is currently following the session.
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
