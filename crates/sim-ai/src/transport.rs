//! HTTP seam for the text-generation service.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Raw response: status code plus the unparsed body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The request never completed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to build http client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Posts a JSON body to the generation endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, body: &serde_json::Value)
        -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport. The API key is sent as the `key` query parameter.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
