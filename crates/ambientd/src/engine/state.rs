use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// State of a single entity as reported by an integration.
///
/// Mirrors the Home Assistant state object: a state string plus a free-form
/// attribute map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityState {
    /// Current state string (e.g. "on", "off", "playing", "idle").
    pub state: String,

    /// Entity attributes (brightness, xy_color, media_content_type, ...).
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style helper to set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn is_on(&self) -> bool {
        self.state == "on"
    }
}

/// Centralized snapshot of every entity the engine knows about.
///
/// Apps receive this through their `AppContext`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: HashMap<String, EntityState>,
}

impl State {
    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.entities.get(entity_id)
    }
}
