//! Apps are the reactive behaviors driven by the engine.
//!
//! An app declares what it listens to through [`Subscription`]s and reacts in
//! [`App::handle_event`]. Handlers are synchronous: they read the state
//! snapshot and queue service calls on the [`AppContext`], and the engine
//! routes the queued calls once the handler returns. The engine never runs two
//! handlers at the same time.

use std::sync::Arc;

use chrono::DateTime;
use chrono::Local;
use linkme::distributed_slice;

use super::event::Event;
use super::message::ServiceCall;
use super::state::EntityState;
use super::state::State;
use crate::config::Config;

/// Result type for app factory functions
pub type AppFactoryResult = anyhow::Result<Option<Box<dyn App>>>;

#[distributed_slice]
pub static APPS: [fn(&Config) -> AppFactoryResult];

/// What an app wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// State-string changes of one entity. Attribute-only updates are not delivered.
    State(String),
    /// Events of one type fired on the bus.
    Event(String),
}

impl Subscription {
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (
                Subscription::State(id),
                Event::StateChanged {
                    entity_id,
                    old_state,
                    new_state,
                },
            ) => {
                id == entity_id
                    && old_state.as_ref().map(|s| &s.state) != new_state.as_ref().map(|s| &s.state)
            }
            (Subscription::Event(t), Event::Fired { event_type, .. }) => t == event_type,
            _ => false,
        }
    }
}

/// Everything a handler may touch while it runs.
pub struct AppContext {
    state: Arc<State>,
    now: DateTime<Local>,
    outbox: Vec<ServiceCall>,
}

impl AppContext {
    pub fn new(state: Arc<State>, now: DateTime<Local>) -> Self {
        Self {
            state,
            now,
            outbox: Vec::new(),
        }
    }

    /// Current state of an entity, if known.
    pub fn get_state(&self, entity_id: &str) -> Option<&EntityState> {
        self.state.get(entity_id)
    }

    /// Local time at which the event is being handled.
    pub fn now(&self) -> DateTime<Local> {
        self.now
    }

    /// Queue a service call. Delivery is fire-and-forget.
    pub fn call_service(&mut self, call: ServiceCall) {
        self.outbox.push(call);
    }

    /// Drain the queued service calls, in the order they were issued.
    pub fn take_calls(&mut self) -> Vec<ServiceCall> {
        std::mem::take(&mut self.outbox)
    }
}

/// App trait that all reactive behaviors implement
pub trait App: Send {
    /// Get the name/identifier of this app
    fn name(&self) -> &str;

    /// Entities and event types this app listens to
    fn subscriptions(&self) -> Vec<Subscription>;

    /// React to one event. Must not block.
    fn handle_event(&mut self, event: &Event, ctx: &mut AppContext);

    /// Serialize current app status for the HTTP API
    fn status_json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
