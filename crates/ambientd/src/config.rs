//! Configuration file parsing and structures.
//!
//! ambientd uses a single TOML file with three kinds of sections:
//! - `[logging]` and `[api]` for the daemon itself
//! - `[integrations.*]` for the systems that feed the engine (Home Assistant)
//! - `[apps.*]` for the reactive behaviors driven by the engine

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "integration_ha")]
use crate::integrations::ha::HaConfig;
use crate::kodi::KodiAmbientConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP status API; disabled when the section is absent
    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,

    #[serde(default)]
    pub apps: AppsConfig,
}

#[derive(
    Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"ambientd::kodi" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter: the global level plus one directive per override.
    pub fn env_filter(&self) -> EnvFilter {
        let mut targets: Vec<_> = self.overrides.iter().collect();
        targets.sort();

        targets.into_iter().fold(
            EnvFilter::default().add_directive(LevelFilter::from(self.level).into()),
            |filter, (target, level)| {
                match format!("{}={}", target, LevelFilter::from(*level)).parse() {
                    Ok(directive) => filter.add_directive(directive),
                    Err(e) => {
                        eprintln!("Invalid log override for '{}': {}", target, e);
                        filter
                    }
                }
            },
        )
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// HTTP status API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Home Assistant REST + WebSocket integration
    #[cfg(feature = "integration_ha")]
    #[serde(default)]
    pub ha: Option<HaConfig>,
}

/// App configuration container
#[derive(Debug, Default, Deserialize)]
pub struct AppsConfig {
    #[serde(default)]
    pub kodi_ambient: Option<KodiAmbientConfig>,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        #[cfg(feature = "integration_ha")]
        if let Some(ha) = &self.integrations.ha {
            if !ha.url.starts_with("http://") && !ha.url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    field: "integrations.ha.url".to_string(),
                    message: format!("'{}' is not an http(s) URL", ha.url),
                });
            }
        }

        if let Some(kodi) = &self.apps.kodi_ambient {
            if !kodi.media_player.starts_with("media_player.") {
                return Err(ConfigError::Invalid {
                    field: "apps.kodi_ambient.media_player".to_string(),
                    message: format!("'{}' is not a media_player entity", kodi.media_player),
                });
            }

            if let Some(light) = kodi
                .lights_dim
                .iter()
                .chain(kodi.lights_off.iter())
                .find(|l| !l.starts_with("light."))
            {
                return Err(ConfigError::Invalid {
                    field: "apps.kodi_ambient.lights".to_string(),
                    message: format!("'{}' is not a light entity", light),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const FULL_CONFIG: &str = r#"
        [logging]
        level = "debug"
        overrides."ambientd::integrations" = "warn"

        [api]
        port = 9000

        [integrations.ha]
        url = "http://homeassistant.local:8123"
        token = "secret"

        [apps.kodi_ambient]
        media_player = "media_player.kodi"
        lights_dim = "light.salon_1,light.salon_2"
        lights_off = ["light.cocina"]
        notifier = "notify.ios_phone"
        bot_target = "-1001234"
    "#;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.api.is_none());
        assert!(config.apps.kodi_ambient.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(FULL_CONFIG).unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.overrides.get("ambientd::integrations"),
            Some(&LogLevel::Warn)
        );

        let api = config.api.as_ref().unwrap();
        assert_eq!(api.listen, "127.0.0.1");
        assert_eq!(api.port, 9000);

        #[cfg(feature = "integration_ha")]
        {
            let ha = config.integrations.ha.as_ref().unwrap();
            assert_eq!(ha.url, "http://homeassistant.local:8123");
        }

        let kodi = config.apps.kodi_ambient.as_ref().unwrap();
        assert_eq!(kodi.lights_dim, vec!["light.salon_1", "light.salon_2"]);
        assert_eq!(kodi.lights_off, vec!["light.cocina"]);
        assert_eq!(kodi.bot_target, -1001234);
    }

    #[test]
    fn test_reject_non_light_entity() {
        let toml = r#"
            [apps.kodi_ambient]
            media_player = "media_player.kodi"
            lights_dim = "switch.fan"
            notifier = "notify.ios_phone"
            bot_target = 1
        "#;

        match Config::parse(toml) {
            Err(ConfigError::Invalid { field, .. }) => {
                assert_eq!(field, "apps.kodi_ambient.lights")
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[cfg(feature = "integration_ha")]
    #[test]
    fn test_reject_bad_ha_url() {
        let toml = r#"
            [integrations.ha]
            url = "homeassistant.local"
            token = "secret"
        "#;

        assert!(matches!(
            Config::parse(toml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.apps.kodi_ambient.is_some());
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file("/nonexistent/ambientd.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    fn test_log_level_to_filter() {
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
        assert_eq!(LevelFilter::from(LogLevel::default()), LevelFilter::INFO);
    }
}
