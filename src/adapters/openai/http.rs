//! Shared HTTP transport for OpenAI-compatible endpoints.

use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::OpenAiApiError;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::OpenAiConfig;

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    /// API key. Falls back to `OPENAI_API_KEY` env var.
    pub api_key: Option<String>,
    /// Base URL for the API. Default: `https://api.openai.com/v1`.
    pub base_url: String,
    /// Request timeout in seconds. Default: 120.
    pub timeout_secs: u64,
    /// Retries after a transient failure. Default: 3.
    pub max_transport_retries: u32,
    /// First retry delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Cap on a single retry delay in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self::from_config(&OpenAiConfig::default())
    }
}

impl OpenAiClientConfig {
    /// Client settings from the `openai` config section.
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
            max_transport_retries: config.max_transport_retries,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }

    pub(crate) fn get_api_key(&self) -> DomainResult<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                DomainError::Configuration(
                    "OpenAI API key not set. Set OPENAI_API_KEY env var or configure openai.api_key."
                        .to_string(),
                )
            })
    }
}

/// Authenticated JSON-over-HTTP client with bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct OpenAiHttp {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl OpenAiHttp {
    /// Fails fast with a configuration error when no API key is available.
    pub fn new(config: &OpenAiClientConfig) -> DomainResult<Self> {
        let api_key = config.get_api_key()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_transport_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
        })
    }

    /// POST `body` to `path`, retrying transient failures.
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, OpenAiApiError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build();

        let max_retries = self.max_retries;
        let mut attempt = 0u32;
        let url_ref = url.as_str();

        let operation = || {
            attempt += 1;
            let current = attempt;
            async move {
                match self.send_once(url_ref, body).await {
                    Ok(resp) => Ok(resp),
                    Err(e) if e.is_transient() && current <= max_retries => {
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        };

        backoff::future::retry_notify(policy, operation, |err: OpenAiApiError, wait: Duration| {
            warn!(
                url = %url,
                error = %err,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "transient OpenAI failure, retrying"
            );
        })
        .await
    }

    async fn send_once<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp, OpenAiApiError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(OpenAiApiError::from_status(status, body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| OpenAiApiError::Decode(e.to_string()))
    }
}
