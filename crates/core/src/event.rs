//! Domain event system: decoupled observation of agent runs.
//!
//! Agents publish events as a run progresses. The gateway, the CLI, and
//! tests can subscribe without the control loop knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::AgentState;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run was accepted and seeded with the user's query
    RunStarted {
        agent: String,
        query_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The agent moved between lifecycle states
    StateChanged {
        agent: String,
        from: AgentState,
        to: AgentState,
        timestamp: DateTime<Utc>,
    },

    /// One step of the control loop returned
    StepCompleted {
        agent: String,
        step: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Orphaned tool messages were dropped from memory
    HistoryRepaired {
        agent: String,
        removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Repeated assistant replies were detected
    StuckDetected {
        agent: String,
        step: u32,
        timestamp: DateTime<Utc>,
    },

    /// A run returned control to its caller
    RunFinished {
        agent: String,
        steps: u32,
        final_state: AgentState,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
