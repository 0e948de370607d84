//! Reqwest JSON Fetcher
//!
//! Implements JsonFetcher with a shared reqwest client. Each call is bounded
//! by its own timeout; when it fires the in-flight request future is dropped,
//! which closes the underlying connection.

use crate::domain::ports::{FetchError, JsonFetcher};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default User-Agent sent to providers.
pub const DEFAULT_USER_AGENT: &str = concat!("ip-locator/", env!("CARGO_PKG_VERSION"));

/// HTTP GET + JSON parse with a per-call deadline.
#[derive(Debug, Clone)]
pub struct ReqwestJsonFetcher {
    client: Arc<Client>,
}

impl ReqwestJsonFetcher {
    /// Build a fetcher with its own client.
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self::with_client(client))
    }

    /// Wrap an existing client (shared connection pool).
    pub fn with_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn exchange(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::InvalidJson(e.to_string()))
    }
}

#[async_trait]
impl JsonFetcher for ReqwestJsonFetcher {
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        match tokio::time::timeout(timeout, self.exchange(url)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("request to {} abandoned after {:?}", url, timeout);
                Err(FetchError::Timeout(timeout))
            }
        }
    }
}
