use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use super::HaConfig;
use crate::engine::EntityState;
use crate::engine::ServiceCall;

#[derive(Debug, thiserror::Error)]
pub enum HaError {
    #[error("access token is not a valid header value")]
    InvalidToken,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Home Assistant returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// A state object as returned by `GET /api/states`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HaState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl HaState {
    pub fn into_entity(self) -> (String, EntityState) {
        (
            self.entity_id,
            EntityState {
                state: self.state,
                attributes: self.attributes,
            },
        )
    }
}

/// Trait for Home Assistant REST operations
///
/// This trait allows for mocking the REST client for testing purposes
#[async_trait]
pub trait HaClient: Send + Sync {
    /// Fetch every entity state
    async fn get_states(&self) -> Result<Vec<HaState>, HaError>;

    /// Invoke a service; the call data is sent as the JSON body
    async fn call_service(&self, call: &ServiceCall) -> Result<(), HaError>;
}

/// Mock Home Assistant client for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockHaClient {
    pub states: Vec<HaState>,
    pub calls: std::sync::Mutex<Vec<ServiceCall>>,
    pub fail_calls: bool,
}

#[cfg(test)]
#[async_trait]
impl HaClient for MockHaClient {
    async fn get_states(&self) -> Result<Vec<HaState>, HaError> {
        Ok(self.states.clone())
    }

    async fn call_service(&self, call: &ServiceCall) -> Result<(), HaError> {
        if self.fail_calls {
            return Err(HaError::Status {
                status: 400,
                body: "bad request".to_string(),
            });
        }
        self.calls.lock().unwrap().push(call.clone());
        Ok(())
    }
}

/// Real client for the Home Assistant REST API using reqwest
pub struct RestClient {
    base_url: String,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(config: &HaConfig) -> Result<Self, HaError> {
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| HaError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, HaError> {
        if res.status().is_success() {
            return Ok(res);
        }

        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        Err(HaError::Status { status, body })
    }
}

#[async_trait]
impl HaClient for RestClient {
    async fn get_states(&self) -> Result<Vec<HaState>, HaError> {
        let res = self.http.get(self.endpoint("states")).send().await?;
        Ok(Self::check(res).await?.json().await?)
    }

    async fn call_service(&self, call: &ServiceCall) -> Result<(), HaError> {
        let url = self.endpoint(&format!("services/{}/{}", call.domain, call.service));
        let body = serde_json::Value::Object(call.data.clone());
        debug!("POST {} {}", url, body);

        let res = self.http.post(&url).json(&call.data).send().await?;
        Self::check(res).await?;
        Ok(())
    }
}
