//! C11 — pipeline observability.
//!
//! Every stage emits a structured event with a stable key (spec.md §4.11).
//! The sink is injected, not ambiently imported, per spec.md §9's
//! "Global mutable state... named process-wide singletons... handed to
//! components by injection". `TracingEventSink` is the concrete sink used
//! by the running binary; `InMemoryEventSink` backs assertions in tests of
//! C6/C7/C8.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::info;

/// One observability event: a stable string key plus a JSON payload
/// carrying the fields spec.md §4.8/§4.11 name for that key.
#[derive(Debug, Clone)]
pub struct Event {
    pub key: &'static str,
    pub fields: Value,
}

impl Event {
    pub fn new(key: &'static str, fields: Value) -> Self {
        Self { key, fields }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Emits every event as a structured `tracing` event at `info` level,
/// matching the teacher's direct `info!`/`warn!` call sites but
/// generalized into one sink implementing the shared trait.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: Event) {
        info!(key = event.key, fields = %event.fields, "pipeline event");
    }
}

/// Records every event in memory, in order. Used by tests that assert on
/// which events a component emitted.
#[derive(Default, Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.key).collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
