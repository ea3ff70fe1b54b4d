//! Change notifications emitted by the memory service.
//!
//! Consumers (GUI, TUI, logging) subscribe to an [`EventBus`] and receive a
//! closed set of [`MemoryEvent`] variants. Events are fire-and-forget; a bus
//! with no subscribers drops them.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::memory::types::{BlockType, MemoryBlock, Scope};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum MemoryEvent {
    /// `memory:updated`
    #[serde(rename = "memory:updated")]
    Updated {
        block: MemoryBlock,
        previous_version: Option<u32>,
        is_new: bool,
    },

    /// `memory:deleted`
    #[serde(rename = "memory:deleted")]
    Deleted {
        id: String,
        #[serde(rename = "type")]
        block_type: BlockType,
        scope: Scope,
    },

    /// `memory:scope:changed`
    #[serde(rename = "memory:scope:changed")]
    ScopeChanged { previous_scope: Scope, new_scope: Scope },

    /// `memory:cleared`
    #[serde(rename = "memory:cleared")]
    Cleared { agent_id: String },

    /// `memory:error`
    #[serde(rename = "memory:error")]
    Error { error: String, operation: String },
}

impl MemoryEvent {
    /// Wire name of the event, e.g. `memory:updated`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "memory:updated",
            Self::Deleted { .. } => "memory:deleted",
            Self::ScopeChanged { .. } => "memory:scope:changed",
            Self::Cleared { .. } => "memory:cleared",
            Self::Error { .. } => "memory:error",
        }
    }
}

/// Broadcast channel for [`MemoryEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<MemoryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: MemoryEvent) {
        tracing::trace!(event = event.name(), "memory event");
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
