use std::fmt;

use serde::Deserialize;

fn default_timeout_secs() -> u64 {
    10
}

/// Configuration for the Home Assistant integration
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base URL, e.g. "http://homeassistant.local:8123"
    pub url: String,

    /// Long-lived access token
    pub token: String,

    /// REST request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_redaction() {
        let config: Config = toml::from_str(
            r#"
            url = "http://homeassistant.local:8123"
            token = "very-secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout_secs, 10);
        assert!(!format!("{:?}", config).contains("very-secret"));
    }
}
