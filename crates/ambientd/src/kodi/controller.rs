//! The playback light controller: reacts to Kodi state changes and to the
//! results of the `Player.GetItem` query it issues.

use std::str::FromStr;

use chrono::DateTime;
use chrono::Local;
use chrono::TimeDelta;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::config::KodiAmbientConfig;
use super::format::info_params;
use super::item::Item;
use super::lights::override_lights;
use super::lights::restore_lights;
use super::lights::LightSnapshot;
use super::notify::bot_notifications;
use super::notify::push_notification;
use crate::engine::App;
use crate::engine::AppContext;
use crate::engine::Event;
use crate::engine::ServiceCall;
use crate::engine::Subscription;

/// Event fired by Home Assistant with the result of `kodi.call_method`
pub const EVENT_KODI_CALL_METHOD_RESULT: &str = "kodi_call_method_result";

pub const METHOD_GET_ITEM: &str = "Player.GetItem";
pub const METHOD_GET_PLAYERS: &str = "Player.GetPlayers";

const KODI_PLAYER_ID: u32 = 1;

const ITEM_PROPERTIES: [&str; 29] = [
    "title", "artist", "albumartist", "genre", "year", "rating", "album", "track", "duration",
    "playcount", "fanart", "plot", "originaltitle", "lastplayed", "firstaired", "season",
    "episode", "showtitle", "thumbnail", "file", "tvshowid", "watchedepisodes", "art",
    "description", "theme", "dateadded", "runtime", "starttime", "endtime",
];

/// `media_content_type` treated as video before the item query answers
const VIDEO_CONTENT_TYPE: &str = "tvshow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum PlayerState {
    Playing,
    Paused,
    Idle,
    Off,
    On,
}

/// Dims or turns off the configured lights while Kodi plays video, restores
/// them afterwards, and announces what is playing.
pub struct PlaybackLightController {
    config: KodiAmbientConfig,
    is_playing_video: bool,
    current_item: Option<Item>,
    /// Last notification, or last stop
    last_play: DateTime<Local>,
    light_snapshot: LightSnapshot,
}

impl PlaybackLightController {
    pub fn new(config: KodiAmbientConfig, now: DateTime<Local>) -> Self {
        info!(
            "Kodi ambient initialized with dim_lights={:?}, off_lights={:?}",
            config.lights_dim, config.lights_off
        );
        Self {
            config,
            is_playing_video: false,
            current_item: None,
            last_play: now,
            light_snapshot: LightSnapshot::new(),
        }
    }

    fn debounce(&self) -> TimeDelta {
        i64::try_from(self.config.debounce_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Media player state transitions
    fn on_player_state(&mut self, old: Option<&str>, new: Option<&str>, ctx: &mut AppContext) {
        match new.and_then(|s| PlayerState::from_str(s).ok()) {
            Some(PlayerState::Playing) => {
                self.ask_for_playing_item(ctx);

                let content_type = ctx
                    .get_state(&self.config.media_player)
                    .and_then(|s| s.attribute("media_content_type"))
                    .and_then(|v| v.as_str());
                self.is_playing_video = content_type == Some(VIDEO_CONTENT_TYPE);
                info!(
                    "Kodi playing: media_content_type={:?}, is_playing_video={}",
                    content_type, self.is_playing_video
                );
            }
            Some(PlayerState::Idle) if self.is_playing_video => self.stop(old, new, ctx),
            Some(PlayerState::Off) => self.stop(old, new, ctx),
            _ => {}
        }
    }

    fn stop(&mut self, old: Option<&str>, new: Option<&str>, ctx: &mut AppContext) {
        self.is_playing_video = false;
        self.last_play = ctx.now();
        self.current_item = None;
        info!("Kodi stop: {:?} -> {:?}", old, new);

        restore_lights(&self.config, &self.light_snapshot, ctx);
    }

    fn ask_for_playing_item(&self, ctx: &mut AppContext) {
        ctx.call_service(
            ServiceCall::new("kodi", "call_method")
                .with("entity_id", self.config.media_player.as_str())
                .with("method", METHOD_GET_ITEM)
                .with("playerid", KODI_PLAYER_ID)
                .with("properties", json!(ITEM_PROPERTIES)),
        );
    }

    /// Results of `kodi.call_method`, matched on the method that was called
    fn on_call_method_result(&mut self, data: &Value, ctx: &mut AppContext) {
        let method = data.pointer("/input/method").and_then(|v| v.as_str());
        let result = data.get("result").unwrap_or(&Value::Null);

        match method {
            Some(METHOD_GET_ITEM) => self.on_playing_item(result, ctx),
            Some(METHOD_GET_PLAYERS) => info!("Kodi players: {}", result),
            other => debug!("Ignoring Kodi result for method {:?}", other),
        }
    }

    fn on_playing_item(&mut self, result: &Value, ctx: &mut AppContext) {
        debug!("Kodi item result: {}", result);

        let Some(raw) = result.get("item") else {
            warn!("Received bad Kodi result: {}", result);
            return;
        };
        let item: Item = match serde_json::from_value(raw.clone()) {
            Ok(item) => item,
            Err(e) => {
                warn!("Malformed Kodi item ({}): {}", e, raw);
                return;
            }
        };

        let new_video = self.current_item.as_ref() != Some(&item);
        let elapsed = ctx.now() - self.last_play;
        self.is_playing_video = item.kind.is_notifiable();
        let notify = self.is_playing_video && (new_video || elapsed >= self.debounce());

        let item = &*self.current_item.insert(item);
        if !notify {
            debug!(
                "No notification for {} '{}' (new={}, elapsed={}s)",
                item.kind,
                item.title,
                new_video,
                elapsed.num_seconds()
            );
            return;
        }

        self.last_play = ctx.now();
        override_lights(&self.config, &mut self.light_snapshot, ctx);

        let params = info_params(item, &self.config.local_network);
        ctx.call_service(push_notification(&self.config, &params));
        for call in bot_notifications(&self.config, &params) {
            ctx.call_service(call);
        }
    }
}

impl App for PlaybackLightController {
    fn name(&self) -> &str {
        "kodi_ambient"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::State(self.config.media_player.clone()),
            Subscription::Event(EVENT_KODI_CALL_METHOD_RESULT.to_string()),
        ]
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut AppContext) {
        match event {
            Event::StateChanged { .. } => {
                self.on_player_state(event.old_state_str(), event.new_state_str(), ctx)
            }
            Event::Fired { data, .. } => self.on_call_method_result(data, ctx),
        }
    }

    fn status_json(&self) -> Value {
        json!({
            "media_player": self.config.media_player,
            "is_playing_video": self.is_playing_video,
            "current_item": self.current_item.as_ref().map(|i| json!({
                "type": i.kind.to_string(),
                "title": i.title,
            })),
            "last_play": self.last_play.to_rfc3339(),
            "lights_snapshotted": self.light_snapshot.len(),
        })
    }
}
