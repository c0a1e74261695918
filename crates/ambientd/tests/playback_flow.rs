//! End-to-end flow through the engine: a fake integration feeds Kodi and
//! light states in and records every command the engine sends back.

use std::error::Error;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use ambientd::engine::EntityState;
use ambientd::engine::FromIntegrationMessage;
use ambientd::engine::FromIntegrationSender;
use ambientd::engine::Integration;
use ambientd::engine::ServiceCall;
use ambientd::engine::ToIntegrationMessage;
use ambientd::kodi::KodiAmbientConfig;
use ambientd::kodi::PlaybackLightController;
use ambientd::kodi::EVENT_KODI_CALL_METHOD_RESULT;
use ambientd::kodi::METHOD_GET_ITEM;
use ambientd::Engine;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::Local;
use chrono::TimeZone;
use serde_json::json;
use serde_json::Value;

type Recorded = Arc<Mutex<Vec<ToIntegrationMessage>>>;

struct RecordingIntegration {
    recorded: Recorded,
}

#[async_trait]
impl Integration for RecordingIntegration {
    fn name(&self) -> &str {
        "recording"
    }

    fn provides_services(&self) -> bool {
        true
    }

    async fn setup(&mut self, _tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        self.recorded.lock().unwrap().push(msg);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        Ok(())
    }
}

fn evening() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 1, 15, 20, 30, 0).unwrap()
}

fn config() -> KodiAmbientConfig {
    toml::from_str(
        r#"
        media_player = "media_player.kodi"
        lights_dim = "light.salon"
        lights_off = "light.cocina"
        notifier = "notify.ios_phone"
        bot_target = -1001234
        "#,
    )
    .unwrap()
}

fn discovered(entity_id: &str, state: EntityState) -> FromIntegrationMessage {
    FromIntegrationMessage::EntityDiscovered {
        entity_id: entity_id.to_string(),
        state,
        integration_name: "recording".to_string(),
    }
}

fn player(old: &str, new: &str, content_type: &str) -> FromIntegrationMessage {
    FromIntegrationMessage::StateChanged {
        entity_id: "media_player.kodi".to_string(),
        old_state: Some(EntityState::new(old)),
        new_state: Some(
            EntityState::new(new).with_attribute("media_content_type", json!(content_type)),
        ),
    }
}

fn item_result(item: Value) -> FromIntegrationMessage {
    FromIntegrationMessage::EventFired {
        event_type: EVENT_KODI_CALL_METHOD_RESULT.to_string(),
        data: json!({
            "entity_id": "media_player.kodi",
            "result": {"item": item},
            "result_ok": true,
            "input": {"method": METHOD_GET_ITEM, "params": {}}
        }),
    }
}

/// Start an engine with the recording integration and the Kodi app, feed it
/// `messages`, and wait until `expected` commands were recorded.
async fn run_flow(messages: Vec<FromIntegrationMessage>, expected: usize) -> Vec<ToIntegrationMessage> {
    let recorded: Recorded = Arc::default();

    let mut engine = Engine::new();
    engine.set_clock(evening);
    engine.register_integration(
        "recording".to_string(),
        Box::new(RecordingIntegration {
            recorded: recorded.clone(),
        }),
    );
    engine.register_app(Box::new(PlaybackLightController::new(config(), evening())));
    let engine = Arc::new(engine);

    let tx = engine.message_sender();
    for msg in messages {
        tx.send(msg).await.unwrap();
    }

    let runner = engine.clone();
    let run = tokio::spawn(async move {
        let _ = runner.run().await;
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while recorded.lock().unwrap().len() < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("engine did not produce the expected commands");

    // Give a stray extra command the chance to show up
    tokio::time::sleep(Duration::from_millis(50)).await;
    run.abort();

    let recorded = recorded.lock().unwrap().clone();
    recorded
}

fn service_calls(recorded: &[ToIntegrationMessage]) -> Vec<&ServiceCall> {
    recorded
        .iter()
        .filter_map(|m| match m {
            ToIntegrationMessage::CallService(call) => Some(call),
            ToIntegrationMessage::SubscribeEvents { .. } => None,
        })
        .collect()
}

fn world() -> Vec<FromIntegrationMessage> {
    vec![
        discovered("media_player.kodi", EntityState::new("idle")),
        discovered(
            "light.salon",
            EntityState::new("on")
                .with_attribute("brightness", json!(254))
                .with_attribute("xy_color", json!([0.3, 0.3])),
        ),
        discovered(
            "light.cocina",
            EntityState::new("on").with_attribute("brightness", json!(120)),
        ),
    ]
}

#[tokio::test]
async fn test_episode_playback_dims_notifies_and_restores() {
    let mut messages = world();
    messages.push(player("idle", "playing", "episode"));
    messages.push(item_result(json!({
        "type": "episode",
        "showtitle": "Friends",
        "season": 8,
        "episode": 13,
        "title": "The One Where Chandler Takes A Bath",
        "plot": "Chandler discovers baths.",
        "runtime": 1297,
        "art": {"fanart": "http://192.168.1.5/img.jpg"}
    })));
    messages.push(player("playing", "idle", "episode"));

    let recorded = run_flow(messages, 9).await;

    match &recorded[0] {
        ToIntegrationMessage::SubscribeEvents { event_types } => {
            assert_eq!(event_types, &vec![EVENT_KODI_CALL_METHOD_RESULT.to_string()])
        }
        other => panic!("Expected SubscribeEvents first, got {:?}", other),
    }

    let calls = service_calls(&recorded);
    let names: Vec<String> = calls.iter().map(|c| c.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "kodi.call_method",
            "light.turn_on",
            "light.turn_off",
            "notify.ios_phone",
            "telegram_bot.send_photo",
            "telegram_bot.send_message",
            "light.turn_on",
            "light.turn_on",
        ]
    );

    // Dimmed to the evening ceiling
    assert_eq!(calls[1].entity_id(), Some("light.salon"));
    assert_eq!(calls[1].data["brightness"], json!(150));

    assert_eq!(
        calls[3].data["title"],
        json!("Friends S08E13 The One Where Chandler Takes A Bath")
    );
    assert_eq!(
        calls[3].data["message"],
        json!("Chandler discovers baths.\n∆T: 0:21:37.")
    );

    // Restored from the snapshot taken before the override
    assert_eq!(
        Value::Object(calls[6].data.clone()),
        json!({
            "entity_id": "light.salon",
            "transition": 2,
            "xy_color": [0.3, 0.3],
            "brightness": 254
        })
    );
    assert_eq!(calls[7].entity_id(), Some("light.cocina"));
}

#[tokio::test]
async fn test_non_video_item_only_queries() {
    let mut messages = world();
    messages.push(player("idle", "playing", "music"));
    messages.push(item_result(json!({"type": "song", "title": "Yesterday"})));
    messages.push(player("playing", "idle", "music"));

    let recorded = run_flow(messages, 2).await;
    let names: Vec<String> = service_calls(&recorded)
        .iter()
        .map(|c| c.to_string())
        .collect();

    assert_eq!(names, vec!["kodi.call_method"]);
}
