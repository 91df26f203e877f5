//! In-process event bus for consultation lifecycle events.
//!
//! A process-wide topic→subscribers registry with synchronous fan-out:
//! every registered handler runs in registration order on the publisher's
//! thread. The bus is ambient observability - the core never depends on
//! subscriber behaviour for correctness, and handlers must not panic.
//! Subscribers must not retain event references beyond the call.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Topics published by the consultation core.
pub mod topics {
    pub const CONSULTATION_STARTED: &str = "consultation:started";
    pub const COST_ESTIMATED: &str = "consultation:cost_estimated";
    pub const USER_CONSENT: &str = "consultation:user_consent";
    pub const ROUND_ARTIFACT: &str = "consultation:round_artifact";
    pub const ROUND_COMPLETED: &str = "round:completed";
    pub const AGENT_THINKING: &str = "agent:thinking";
    pub const AGENT_COMPLETED: &str = "agent:completed";
    pub const PROVIDER_SUBSTITUTED: &str = "consultation:provider_substituted";
    pub const CONSULTATION_COMPLETED: &str = "consultation:completed";
    pub const CONSULTATION_ABORTED: &str = "consultation:aborted";
}

/// An event delivered to subscribers. Every event carries at minimum the
/// consultation id.
#[derive(Debug, Clone)]
pub struct ConsultEvent {
    pub consultation_id: String,
    pub payload: Value,
}

impl ConsultEvent {
    pub fn new(consultation_id: impl Into<String>, payload: Value) -> Self {
        Self {
            consultation_id: consultation_id.into(),
            payload,
        }
    }
}

type Handler = Arc<dyn Fn(&ConsultEvent) + Send + Sync>;

/// Topic→subscribers registry.
///
/// Created lazily on first [`EventBus::global`], never destroyed.
/// Subscribers may run concurrently on different orchestrators' threads
/// and must themselves be thread-safe.
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Handler>>>,
}

static GLOBAL: OnceLock<EventBus> = OnceLock::new();

impl EventBus {
    fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static EventBus {
        GLOBAL.get_or_init(EventBus::new)
    }

    /// Register a handler for a topic. Handlers fire in registration order.
    pub fn subscribe(&self, topic: &str, handler: Handler) {
        self.listeners
            .write()
            .expect("event bus lock poisoned")
            .entry(topic.to_string())
            .or_default()
            .push(handler);
    }

    /// Deliver an event to every subscriber of `topic`, synchronously, on
    /// the caller's thread.
    pub fn emit(&self, topic: &str, event: &ConsultEvent) {
        // Clone the handler list so emit never holds the lock while
        // running subscriber code.
        let handlers: Vec<Handler> = {
            let listeners = self.listeners.read().expect("event bus lock poisoned");
            match listeners.get(topic) {
                Some(list) => list.clone(),
                None => return,
            }
        };
        for handler in handlers {
            handler(event);
        }
    }

    /// Number of subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.listeners
            .read()
            .expect("event bus lock poisoned")
            .get(topic)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}
