//! Kodi ambient lights: dim or switch off lights while video plays, restore
//! them on stop, and announce what is playing.

mod config;
mod controller;
mod format;
mod item;
mod lights;
mod notify;

pub use config::KodiAmbientConfig;
pub use config::ServiceName;
pub use controller::PlaybackLightController;
pub use controller::EVENT_KODI_CALL_METHOD_RESULT;
pub use controller::METHOD_GET_ITEM;
pub use controller::METHOD_GET_PLAYERS;
pub use item::Item;
pub use item::ItemType;

use chrono::Local;
use linkme::distributed_slice;

use crate::config::Config;
use crate::engine;

#[distributed_slice(engine::APP_REGISTRY)]
fn init_kodi_ambient(config: &Config) -> engine::AppFactoryResult {
    let kodi_config = if let Some(c) = &config.apps.kodi_ambient {
        c
    } else {
        return Ok(None);
    };

    Ok(Some(Box::new(PlaybackLightController::new(
        kodi_config.clone(),
        Local::now(),
    ))))
}
