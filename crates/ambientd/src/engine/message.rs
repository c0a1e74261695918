//! Type-safe message system for ambientd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use std::fmt;

use serde_json::Map;
use serde_json::Value;

use super::state::EntityState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered with its initial state. Does not trigger apps.
    EntityDiscovered {
        entity_id: String,
        state: EntityState,
        integration_name: String,
    },

    /// An entity's state or attributes changed. A `None` new state means the
    /// entity was removed.
    StateChanged {
        entity_id: String,
        old_state: Option<EntityState>,
        new_state: Option<EntityState>,
    },

    /// Any other event fired on the integration's bus
    EventFired { event_type: String, data: Value },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Invoke a service (e.g. `light.turn_on`)
    CallService(ServiceCall),

    /// Event types the registered apps want delivered
    SubscribeEvents { event_types: Vec<String> },
}

/// A service invocation, fire-and-forget from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Map<String, Value>,
}

impl ServiceCall {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data: Map::new(),
        }
    }

    /// Builder-style helper to add a data field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// `entity_id` target of the call, if any.
    pub fn entity_id(&self) -> Option<&str> {
        self.data.get("entity_id").and_then(|v| v.as_str())
    }
}

impl fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}
