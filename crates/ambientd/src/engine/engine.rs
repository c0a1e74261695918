use std::collections::BTreeMap;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::DateTime;
use chrono::Local;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::app::App;
use super::app::AppContext;
use super::app::Subscription;
use super::event::Event;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::IntegrationContext;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::State;

/// Snapshot of every app's status, keyed by app name.
pub type AppStatus = BTreeMap<String, serde_json::Value>;

struct RegisteredApp {
    subscriptions: Vec<Subscription>,
    app: Box<dyn App>,
}

/// ambientd engine
///
/// This structure handles the flow of events, delivering them to apps one at a
/// time, routing the service calls they issue to the correct integration, and
/// maintaining a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Registered apps. Only the engine loop locks this, so handlers never overlap.
    apps: std::sync::Mutex<Vec<RegisteredApp>>,

    /// Last status reported by each app
    app_status: ArcSwap<AppStatus>,

    /// Communication channels to integrations (for commands)
    integration_channels: HashMap<String, ToIntegrationSender>,

    /// Integrations that accept service calls
    service_providers: Vec<String>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: Vec<JoinHandle<()>>,

    /// Source of the local time handed to apps
    clock: fn() -> DateTime<Local>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            apps: std::sync::Mutex::new(Vec::new()),
            app_status: ArcSwap::new(Arc::default()),
            integration_channels: HashMap::new(),
            service_providers: Vec::new(),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: Vec::new(),
            clock: Local::now,
        }
    }

    /// Replace the clock used for `AppContext::now`
    pub fn set_clock(&mut self, clock: fn() -> DateTime<Local>) {
        self.clock = clock;
    }

    /// Register integrations from configuration
    ///
    /// Runs every factory in the integration registry; factories return `None`
    /// when their section is absent from the config.
    pub fn register_integrations_from_config(&mut self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if integration.provides_services() {
            self.service_providers.push(name.clone());
        }
        self.integration_channels
            .insert(name.clone(), to_integration_tx);

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        self.integration_handles.push(handle);
    }

    /// Register apps from configuration
    pub fn register_apps_from_config(&mut self, cfg: &crate::config::Config) {
        for constr in super::app::APPS {
            match constr(cfg) {
                Ok(Some(app)) => self.register_app(app),
                Ok(None) => {}
                Err(e) => error!("failed to setup app: {:#}", e),
            }
        }
    }

    /// Register an app with the engine
    pub fn register_app(&mut self, app: Box<dyn App>) {
        let subscriptions = app.subscriptions();
        info!("Registered app '{}' ({:?})", app.name(), subscriptions);

        let mut status = AppStatus::clone(&self.app_status.load());
        status.insert(app.name().to_string(), app.status_json());
        self.app_status.store(Arc::new(status));

        match self.apps.get_mut() {
            Ok(apps) => apps.push(RegisteredApp { subscriptions, app }),
            Err(e) => error!("App registry poisoned: {}", e),
        }
    }

    /// Sender that lets callers inject integration messages
    pub fn message_sender(&self) -> FromIntegrationSender {
        self.message_tx.clone()
    }

    /// Send a command to integrations
    ///
    /// Service calls go to every integration that provides services; event
    /// subscriptions are broadcast.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        let targets: Vec<&String> = match &msg {
            ToIntegrationMessage::CallService(_) => self.service_providers.iter().collect(),
            ToIntegrationMessage::SubscribeEvents { .. } => {
                self.integration_channels.keys().collect()
            }
        };

        if targets.is_empty() {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No integration available for command: {:?}", msg),
            )));
        }

        for name in targets {
            let tx = self.integration_channels.get(name).ok_or_else(
                || -> Box<dyn Error + Send> {
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("Integration channel not found: {}", name),
                    ))
                },
            )?;

            tx.send(msg.clone())
                .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
        }

        Ok(())
    }

    /// Run the engine's main event loop
    ///
    /// Announces the event types apps need, then processes incoming messages
    /// from integrations until every sender is gone.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        let event_types = self.subscribed_event_types();
        if !event_types.is_empty() && !self.integration_channels.is_empty() {
            self.send_command(ToIntegrationMessage::SubscribeEvents { event_types })?;
        }

        // Main event loop - only receives FromIntegration messages
        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Get the last status reported by every app.
    pub fn app_status_snapshot(&self) -> Arc<AppStatus> {
        self.app_status.load_full()
    }

    fn subscribed_event_types(&self) -> Vec<String> {
        let apps = match self.apps.lock() {
            Ok(apps) => apps,
            Err(_) => return Vec::new(),
        };

        let mut types: Vec<String> = apps
            .iter()
            .flat_map(|a| a.subscriptions.iter())
            .filter_map(|s| match s {
                Subscription::Event(t) => Some(t.clone()),
                Subscription::State(_) => None,
            })
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                state: entity_state,
                integration_name,
            } => {
                debug!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                let mut state = State::clone(&self.state.load());
                state.entities.insert(entity_id, entity_state);
                self.state.store(Arc::new(state));
            }
            FromIntegrationMessage::StateChanged {
                entity_id,
                old_state,
                new_state,
            } => {
                debug!(
                    "State changed: {} {:?} -> {:?}",
                    entity_id,
                    old_state.as_ref().map(|s| &s.state),
                    new_state.as_ref().map(|s| &s.state)
                );

                {
                    let mut state = State::clone(&self.state.load());
                    match &new_state {
                        Some(s) => {
                            state.entities.insert(entity_id.clone(), s.clone());
                        }
                        None => {
                            state.entities.remove(&entity_id);
                        }
                    }
                    self.state.store(Arc::new(state));
                }

                self.dispatch(&Event::StateChanged {
                    entity_id,
                    old_state,
                    new_state,
                });
            }
            FromIntegrationMessage::EventFired { event_type, data } => {
                debug!("Event fired: {}", event_type);
                self.dispatch(&Event::Fired { event_type, data });
            }
        }
    }

    /// Deliver an event to every subscribed app, one at a time
    fn dispatch(&self, event: &Event) {
        let mut apps = match self.apps.lock() {
            Ok(apps) => apps,
            Err(e) => {
                error!("App registry poisoned: {}", e);
                return;
            }
        };

        let mut status = AppStatus::clone(&self.app_status.load());
        for registered in apps.iter_mut() {
            if !registered.subscriptions.iter().any(|s| s.matches(event)) {
                continue;
            }

            let mut ctx = AppContext::new(self.state.load_full(), (self.clock)());
            registered.app.handle_event(event, &mut ctx);

            for call in ctx.take_calls() {
                debug!("[{}] Calling service {}", registered.app.name(), call);
                if let Err(e) = self.send_command(ToIntegrationMessage::CallService(call)) {
                    warn!("[{}] Service call failed: {}", registered.app.name(), e);
                }
            }

            status.insert(
                registered.app.name().to_string(),
                registered.app.status_json(),
            );
        }
        self.app_status.store(Arc::new(status));
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
