//! Audit sink implementations.
//!
//! Every successful manager mutation produces one [`AuditEvent`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Object the action applied to (`cq`, `ns/lq` or `ns/workload`).
    pub object: String,
    /// Cluster queue involved, if any.
    pub cluster_queue: Option<String>,
    /// Action taken (add, update, delete, admit, buffer, purge).
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::info!(
            event_id = %event.event_id,
            object = %event.object,
            cluster_queue = event.cluster_queue.as_deref().unwrap_or("-"),
            action = %event.action,
            "audit"
        );
    }
}

/// Build an audit event with a fresh v4 id and the current time.
pub fn build_audit_event(
    object: impl Into<String>,
    cluster_queue: Option<&str>,
    action: impl Into<String>,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        object: object.into(),
        cluster_queue: cluster_queue.map(str::to_string),
        action: action.into(),
        created_at_ms: now_ms(),
        payload,
    }
}
