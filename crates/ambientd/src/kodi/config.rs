use std::fmt;

use serde::Deserialize;
use serde::Deserializer;

fn default_bot() -> String {
    "telegram_bot".to_string()
}

fn default_transition() -> u32 {
    2
}

fn default_debounce_secs() -> u64 {
    300
}

fn default_local_network() -> String {
    "192.168.".to_string()
}

fn default_push_category() -> String {
    "KODIPLAY".to_string()
}

/// Configuration for the Kodi ambient-light app
#[derive(Debug, Clone, Deserialize)]
pub struct KodiAmbientConfig {
    /// Kodi media player entity (e.g. "media_player.kodi")
    pub media_player: String,

    /// Lights dimmed to the time-of-day ceiling during playback.
    /// Accepts a comma-joined string or a list.
    #[serde(default, deserialize_with = "entity_list")]
    pub lights_dim: Vec<String>,

    /// Lights turned off during playback
    #[serde(default, deserialize_with = "entity_list")]
    pub lights_off: Vec<String>,

    /// Push notification service, "notify.ios_phone" or "notify/ios_phone"
    pub notifier: ServiceName,

    /// Service domain of the messaging bot
    #[serde(default = "default_bot")]
    pub bot: String,

    /// Chat or group id the bot writes to. May be given as a string.
    #[serde(deserialize_with = "flexible_i64")]
    pub bot_target: i64,

    /// Light transition in seconds
    #[serde(default = "default_transition")]
    pub transition: u32,

    /// Minimum seconds between notifications for the same item
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Image URLs containing this marker are on the LAN and keep plain http
    #[serde(default = "default_local_network")]
    pub local_network: String,

    /// Push category attached to notifications
    #[serde(default = "default_push_category")]
    pub push_category: String,
}

impl KodiAmbientConfig {
    /// Every controlled light, dimmed ones first.
    pub fn all_lights(&self) -> impl Iterator<Item = &String> {
        self.lights_dim.iter().chain(self.lights_off.iter())
    }

    pub fn is_off_light(&self, light_id: &str) -> bool {
        self.lights_off.iter().any(|l| l == light_id)
    }
}

/// A `domain.service` pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ServiceName {
    pub domain: String,
    pub service: String,
}

impl TryFrom<String> for ServiceName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(['.', '/']) {
            Some((domain, service)) if !domain.is_empty() && !service.is_empty() => Ok(Self {
                domain: domain.to_string(),
                service: service.to_string(),
            }),
            _ => Err(format!("'{}' is not of the form domain.service", value)),
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

fn entity_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrList {
        Str(String),
        List(Vec<String>),
    }

    let raw = match StrOrList::deserialize(deserializer)? {
        StrOrList::Str(s) => s.split(',').map(str::to_string).collect(),
        StrOrList::List(l) => l,
    };

    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        Str(String),
        Int(i64),
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::Int(i) => Ok(i),
        StringOrInt::Str(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
    }
}
