use serde_json::Value;

use super::state::EntityState;

/// App-level events.
///
/// Distinct from `FromIntegrationMessage` (transport-level). The engine converts
/// `FromIntegrationMessage` into `Event` at the boundary.
#[derive(Debug, Clone)]
pub enum Event {
    StateChanged {
        entity_id: String,
        old_state: Option<EntityState>,
        new_state: Option<EntityState>,
    },
    Fired {
        event_type: String,
        data: Value,
    },
}

impl Event {
    /// State string before the change, if the entity existed.
    pub fn old_state_str(&self) -> Option<&str> {
        match self {
            Event::StateChanged { old_state, .. } => old_state.as_ref().map(|s| s.state.as_str()),
            Event::Fired { .. } => None,
        }
    }

    /// State string after the change, if the entity still exists.
    pub fn new_state_str(&self) -> Option<&str> {
        match self {
            Event::StateChanged { new_state, .. } => new_state.as_ref().map(|s| s.state.as_str()),
            Event::Fired { .. } => None,
        }
    }
}
