//! Home Assistant WebSocket event listener.
//!
//! Authenticates with the access token, subscribes to `state_changed` plus any
//! event types the engine asked for, and forwards events as engine messages.
//! Reconnects with exponential backoff; subscriptions are replayed on every
//! new connection.

use std::cmp::min;
use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::Sink;
use futures_util::SinkExt;
use futures_util::StreamExt;
use serde_json::json;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::engine::EntityState;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;

pub const STATE_CHANGED: &str = "state_changed";

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Why a connection ended
enum SessionEnd {
    /// The engine or the integration is gone; stop for good
    Closed,
    /// The connection dropped; reconnect
    Disconnected(String),
}

/// Map the REST base URL to the WebSocket endpoint (`http` -> `ws`, `https` -> `wss`).
pub fn websocket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = match base.split_once("://") {
        Some(("https", rest)) => format!("wss://{}", rest),
        Some((_, rest)) => format!("ws://{}", rest),
        None => format!("ws://{}", base),
    };
    format!("{}/api/websocket", base)
}

/// Spawn the listener task. It runs until aborted or until the engine drops
/// its receiver.
pub fn spawn_listener(
    ws_url: String,
    token: String,
    event_types: watch::Receiver<Vec<String>>,
    tx: FromIntegrationSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_listener(ws_url, token, event_types, tx).await;
        info!("Home Assistant event listener finished");
    })
}

async fn run_listener(
    ws_url: String,
    token: String,
    mut event_types: watch::Receiver<Vec<String>>,
    tx: FromIntegrationSender,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        info!("Connecting to Home Assistant WebSocket: {}", ws_url);

        match connect_async(ws_url.as_str()).await {
            Ok((stream, _)) => {
                backoff = INITIAL_BACKOFF;
                match session(stream, &token, &mut event_types, &tx).await {
                    SessionEnd::Closed => return,
                    SessionEnd::Disconnected(reason) => {
                        warn!("Home Assistant WebSocket disconnected: {}", reason)
                    }
                }
            }
            Err(e) => warn!("WebSocket connection failed: {}. Retrying in {:?}", e, backoff),
        }

        tokio::time::sleep(backoff).await;
        backoff = min(backoff.saturating_mul(2), MAX_BACKOFF);
    }
}

async fn session<S>(
    stream: S,
    token: &str,
    event_types: &mut watch::Receiver<Vec<String>>,
    tx: &FromIntegrationSender,
) -> SessionEnd
where
    S: futures_util::Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let (mut write, mut read) = stream.split();
    let mut next_id: u64 = 1;
    let mut subscribed: BTreeSet<String> = BTreeSet::new();
    let mut authenticated = false;

    loop {
        tokio::select! {
            msg = read.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        return SessionEnd::Disconnected(format!("closed by server: {:?}", frame))
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                    None => return SessionEnd::Disconnected("stream ended".to_string()),
                };

                let v: Value = match serde_json::from_str(text.as_str()) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("Failed to parse WebSocket message: {}. Payload: {}", e, text.as_str());
                        continue;
                    }
                };

                match v["type"].as_str() {
                    Some("auth_required") => {
                        if let Err(e) = send_json(&mut write, auth_message(token)).await {
                            return SessionEnd::Disconnected(e.to_string());
                        }
                    }
                    Some("auth_ok") => {
                        info!("Home Assistant WebSocket authenticated");
                        authenticated = true;
                        subscribed.clear();

                        let wanted = wanted_event_types(&event_types.borrow_and_update());
                        if let Err(e) =
                            subscribe_all(&mut write, &mut next_id, &mut subscribed, wanted).await
                        {
                            return SessionEnd::Disconnected(e.to_string());
                        }
                    }
                    Some("auth_invalid") => {
                        return SessionEnd::Disconnected(format!(
                            "authentication rejected: {}",
                            v["message"]
                        ));
                    }
                    Some("result") => {
                        if v["success"] == json!(false) {
                            warn!("Home Assistant request {} failed: {}", v["id"], v["error"]);
                        }
                    }
                    Some("event") => {
                        if let Some(msg) = parse_event(&v["event"]) {
                            if tx.send(msg).await.is_err() {
                                return SessionEnd::Closed;
                            }
                        }
                    }
                    other => debug!("Ignoring WebSocket message type {:?}", other),
                }
            }
            changed = event_types.changed() => {
                if changed.is_err() {
                    return SessionEnd::Closed;
                }
                if !authenticated {
                    continue;
                }

                let wanted = wanted_event_types(&event_types.borrow_and_update());
                if let Err(e) =
                    subscribe_all(&mut write, &mut next_id, &mut subscribed, wanted).await
                {
                    return SessionEnd::Disconnected(e.to_string());
                }
            }
        }
    }
}

/// `state_changed` plus every requested type, deduplicated
fn wanted_event_types(requested: &[String]) -> Vec<String> {
    let mut types: BTreeSet<String> = requested.iter().cloned().collect();
    types.insert(STATE_CHANGED.to_string());
    types.into_iter().collect()
}

async fn subscribe_all<W>(
    write: &mut W,
    next_id: &mut u64,
    subscribed: &mut BTreeSet<String>,
    wanted: Vec<String>,
) -> Result<(), WsError>
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    for event_type in wanted {
        if subscribed.contains(&event_type) {
            continue;
        }

        *next_id += 1;
        debug!("Subscribing to {} (id {})", event_type, next_id);
        send_json(write, subscribe_message(*next_id, &event_type)).await?;
        subscribed.insert(event_type);
    }
    Ok(())
}

async fn send_json<W>(write: &mut W, value: Value) -> Result<(), WsError>
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    write.send(Message::Text(value.to_string().into())).await
}

fn auth_message(token: &str) -> Value {
    json!({"type": "auth", "access_token": token})
}

fn subscribe_message(id: u64, event_type: &str) -> Value {
    json!({"id": id, "type": "subscribe_events", "event_type": event_type})
}

/// Translate the `event` object of a WebSocket event message.
///
/// `state_changed` becomes a state change (a null old or new state means the
/// entity appeared or went away); anything else is passed through as fired.
pub fn parse_event(event: &Value) -> Option<FromIntegrationMessage> {
    let event_type = event["event_type"].as_str()?;
    let data = &event["data"];

    if event_type != STATE_CHANGED {
        return Some(FromIntegrationMessage::EventFired {
            event_type: event_type.to_string(),
            data: data.clone(),
        });
    }

    let entity_id = data["entity_id"].as_str()?.to_string();
    let state = |key: &str| -> Option<EntityState> {
        let raw = data.get(key).filter(|v| !v.is_null())?;
        match serde_json::from_value(raw.clone()) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Malformed {} for {}: {}", key, entity_id, e);
                None
            }
        }
    };

    Some(FromIntegrationMessage::StateChanged {
        old_state: state("old_state"),
        new_state: state("new_state"),
        entity_id,
    })
}
