use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::client::HaClient;
use super::websocket;
use super::HaConfig;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

/// Home Assistant integration for ambientd
///
/// Loads every entity over REST at setup, follows state changes and
/// requested events over the WebSocket API, and executes service calls
/// issued by apps.
pub struct HaIntegration<C: HaClient> {
    client: Arc<C>,
    config: HaConfig,
    /// Event types requested by the engine, shared with the listener
    event_types: watch::Sender<Vec<String>>,
    /// Handle to the background WebSocket listener
    listener: Option<JoinHandle<()>>,
}

impl<C: HaClient> HaIntegration<C> {
    /// Create a new Home Assistant integration
    pub fn new(client: C, config: &HaConfig) -> Self {
        let (event_types, _) = watch::channel(Vec::new());
        Self {
            client: Arc::new(client),
            config: config.clone(),
            event_types,
            listener: None,
        }
    }

    /// Report every current entity state to the engine
    async fn load_states(&self, tx: &FromIntegrationSender) -> Result<usize, Box<dyn Error + Send>> {
        let states = self
            .client
            .get_states()
            .await
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;

        let count = states.len();
        for state in states {
            let (entity_id, state) = state.into_entity();
            let msg = FromIntegrationMessage::EntityDiscovered {
                entity_id,
                state,
                integration_name: "ha".to_string(),
            };
            if let Err(e) = tx.send(msg).await {
                warn!("Failed to send EntityDiscovered message: {}", e);
                break;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl<C: HaClient + 'static> Integration for HaIntegration<C> {
    fn name(&self) -> &str {
        "ha"
    }

    fn provides_services(&self) -> bool {
        true
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        info!("Loading entity states from {}", self.config.url);
        let count = self.load_states(&tx).await?;
        info!("Loaded {} entities from Home Assistant", count);

        let listener = websocket::spawn_listener(
            websocket::websocket_url(&self.config.url),
            self.config.token.clone(),
            self.event_types.subscribe(),
            tx,
        );
        self.listener = Some(listener);

        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::CallService(call) => {
                debug!("Calling Home Assistant service {}", call);
                self.client
                    .call_service(&call)
                    .await
                    .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })?;
            }
            ToIntegrationMessage::SubscribeEvents { event_types } => {
                info!("Subscribing to Home Assistant events: {:?}", event_types);
                self.event_types.send_modify(|current| {
                    current.extend(event_types);
                    current.sort();
                    current.dedup();
                });
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("Home Assistant integration shutting down");
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        Ok(())
    }
}
