//! Ambient light override while video plays, and restore afterwards.

use std::collections::HashMap;

use chrono::NaiveTime;
use chrono::Timelike;
use tracing::debug;
use tracing::warn;

use super::config::KodiAmbientConfig;
use crate::engine::AppContext;
use crate::engine::EntityState;
use crate::engine::ServiceCall;

/// Light id -> state and attributes captured right before the last override.
pub type LightSnapshot = HashMap<String, EntityState>;

/// Brightness ceiling for dimmed lights at a given local time.
///
/// Windows are start-inclusive, end-exclusive and checked in order; the night
/// window wraps midnight.
pub fn max_brightness(time: NaiveTime) -> u64 {
    const WINDOWS: [((u32, u32), (u32, u32), u64); 3] =
        [((9, 0), (19, 0), 200), ((19, 0), (22, 0), 150), ((22, 0), (4, 0), 75)];

    let minute = time.hour() * 60 + time.minute();
    WINDOWS
        .iter()
        .find(|((sh, sm), (eh, em), _)| {
            let (start, end) = (sh * 60 + sm, eh * 60 + em);
            if start <= end {
                start <= minute && minute < end
            } else {
                minute >= start || minute < end
            }
        })
        .map(|(_, _, ceiling)| *ceiling)
        .unwrap_or(25)
}

/// Snapshot every configured light, then turn off the off-set and dim the rest.
pub fn override_lights(
    config: &KodiAmbientConfig,
    snapshot: &mut LightSnapshot,
    ctx: &mut AppContext,
) {
    let ceiling = max_brightness(ctx.now().time());

    for light_id in config.all_lights() {
        let state = match ctx.get_state(light_id) {
            Some(s) => s.clone(),
            None => {
                warn!("Light {} has no known state", light_id);
                EntityState::new("unknown")
            }
        };
        snapshot.insert(light_id.clone(), state.clone());

        if config.is_off_light(light_id) {
            debug!("Turning off light {} for playback", light_id);
            ctx.call_service(
                ServiceCall::new("light", "turn_off")
                    .with("entity_id", light_id.as_str())
                    .with("transition", config.transition),
            );
        } else if state.is_on()
            && brightness(&state).is_some_and(|b| b > ceiling)
        {
            debug!("Dimming light {} to {} for playback", light_id, ceiling);
            ctx.call_service(
                ServiceCall::new("light", "turn_on")
                    .with("entity_id", light_id.as_str())
                    .with("transition", config.transition)
                    .with("brightness", ceiling),
            );
        }
    }
}

/// Turn back on every light the last snapshot recorded as on.
///
/// The snapshot is left untouched.
pub fn restore_lights(config: &KodiAmbientConfig, snapshot: &LightSnapshot, ctx: &mut AppContext) {
    for light_id in config.all_lights() {
        let before = match snapshot.get(light_id) {
            Some(s) if s.is_on() => s,
            other => {
                debug!("Nothing to restore for light {}: {:?}", light_id, other);
                continue;
            }
        };

        let mut call = ServiceCall::new("light", "turn_on")
            .with("entity_id", light_id.as_str())
            .with("transition", config.transition);

        if let Some(xy) = present(before, "xy_color") {
            call = call.with("xy_color", xy.clone());
        } else if let Some(ct) = present(before, "color_temp") {
            call = call.with("color_temp", ct.clone());
        }
        if let Some(b) = present(before, "brightness") {
            call = call.with("brightness", b.clone());
        }

        debug!("Restoring light {} from {:?}", light_id, before);
        ctx.call_service(call);
    }
}

fn present<'a>(state: &'a EntityState, key: &str) -> Option<&'a serde_json::Value> {
    state.attribute(key).filter(|v| !v.is_null())
}

fn brightness(state: &EntityState) -> Option<u64> {
    state
        .attribute("brightness")
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.round() as u64)))
}
