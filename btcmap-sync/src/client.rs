//! Remote API client.
//!
//! Fetches pages of records changed since a cursor:
//! `GET <base><endpoint>?updated_since=<ISO-8601>&limit=<N>`. Transport
//! errors and 408/429/5xx responses are retried with exponential backoff
//! and jitter before the sync logic sees a failure.

use crate::error::{SyncError, SyncResult};
use btcmap_types::Timestamp;
use rand::Rng;
use reqwest::header::LAST_MODIFIED;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP settings for the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiClientConfig {
    /// Base URL of the API (e.g. `https://api.btcmap.org`).
    pub base_url: String,
    /// Timeout for a single request, in seconds.
    pub request_timeout_secs: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay, in milliseconds. Doubles per attempt.
    pub base_backoff_ms: u64,
    /// Backoff ceiling, in milliseconds.
    pub max_backoff_ms: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.btcmap.org".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            base_backoff_ms: 250,
            max_backoff_ms: 8_000,
            user_agent: format!("btcmap-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Query of one page of changes.
#[derive(Debug, Clone, Copy)]
pub struct PageQuery<'a> {
    pub updated_since: &'a Timestamp,
    pub limit: usize,
    /// Collection-specific parameters such as field selection.
    pub extra: &'a [(String, String)],
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Client for the remote paginated API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Creates a client with the given settings.
    pub fn new(config: ApiClientConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Returns the client settings.
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Resolves an endpoint path against the base URL. Absolute URLs pass
    /// through unchanged.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Fetches one page of records updated since the query cursor.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &PageQuery<'_>,
    ) -> SyncResult<Vec<T>> {
        let url = self.endpoint_url(endpoint);
        let cursor = query.updated_since.to_iso();
        let limit = query.limit.to_string();

        debug!("Fetching {} since {} (limit {})", url, cursor, limit);

        let response = self
            .send_with_retry(|| {
                self.client
                    .get(&url)
                    .query(&[("updated_since", cursor.as_str()), ("limit", limit.as_str())])
                    .query(query.extra)
            })
            .await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("read page body failed: {e}")))?;

        Ok(serde_json::from_slice(&body)?)
    }

    /// Downloads and decodes a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SyncResult<T> {
        debug!("Downloading {}", url);

        let response = self.send_with_retry(|| self.client.get(url)).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("read body failed: {e}")))?;

        Ok(serde_json::from_slice(&body)?)
    }

    /// Reads the `Last-Modified` header of a resource with a `HEAD` request.
    /// Returns `None` if the header is absent or unparseable.
    pub async fn head_last_modified(&self, url: &str) -> SyncResult<Option<Timestamp>> {
        let response = self.send_with_retry(|| self.client.head(url)).await?;

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| Timestamp::from_datetime(dt.with_timezone(&chrono::Utc)));

        if last_modified.is_none() {
            debug!("No usable Last-Modified header on {}", url);
        }

        Ok(last_modified)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(8);
        let backoff = self
            .config
            .base_backoff_ms
            .saturating_mul(1_u64 << exp)
            .min(self.config.max_backoff_ms);
        let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
        Duration::from_millis(backoff.saturating_add(jitter))
    }

    async fn send_with_retry<F>(&self, build: F) -> SyncResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if is_retryable_status(status.as_u16()) && attempt < max_attempts {
                        let backoff = self.backoff(attempt);
                        warn!(
                            "Retry attempt {}/{} after HTTP {} from {}",
                            attempt,
                            max_attempts - 1,
                            status,
                            response.url()
                        );
                        sleep(backoff).await;
                        continue;
                    }
                    return Err(SyncError::Http {
                        status: status.as_u16(),
                        url: response.url().to_string(),
                    });
                }
                Err(err) => {
                    if is_retryable_transport_error(&err) && attempt < max_attempts {
                        let backoff = self.backoff(attempt);
                        warn!(
                            "Retry attempt {}/{} after transport error: {}",
                            attempt,
                            max_attempts - 1,
                            err
                        );
                        sleep(backoff).await;
                        continue;
                    }
                    return Err(SyncError::Network(format!("request failed: {err}")));
                }
            }
        }
    }
}
