//! HTTP client for the remote analytics service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::types::{interpret_query, interpret_verify, RemoteQueryRequest, ToolMessage, VerifyRequest};
use super::RemoteService;
use crate::error::{BridgeError, Result};
use crate::secrets::Secret;

const VERIFY_PATH: &str = "/api/chat/query/verify";
const QUERY_PATH: &str = "/api/chat/dify/executeByParams";

/// Default timeout for remote requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Remote service client configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub access_token: Secret,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, access_token: Secret) -> Self {
        Self {
            base_url: base_url.into(),
            access_token,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Joins `path` onto the base URL, dropping any trailing slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim().trim_end_matches('/'), path)
    }
}

/// Remote service client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    config: RemoteConfig,
    client: Client,
}

impl HttpRemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BridgeError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Posts `body` and returns the status code and raw body text.
    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> std::result::Result<(u16, String), String> {
        let response = self
            .client
            .post(url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.access_token.expose()),
            )
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.describe_request_error(url, &e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response from {}: {}", url, e))?;

        debug!("POST {} -> {}", url, status);
        Ok((status, text))
    }

    fn describe_request_error(&self, url: &str, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!(
                "Request to {} timed out after {} seconds",
                url,
                self.config.timeout.as_secs()
            )
        } else if error.is_connect() {
            format!("Failed to connect to {}: {}", url, error)
        } else {
            format!("Request to {} failed: {}", url, error)
        }
    }
}

#[async_trait]
impl RemoteService for HttpRemoteClient {
    async fn verify(&self) -> Result<()> {
        if self.config.base_url.trim().is_empty() {
            return Err(BridgeError::credential("Base URL cannot be empty"));
        }
        if self.config.access_token.is_empty() {
            return Err(BridgeError::credential("Access token cannot be empty"));
        }

        let url = self.config.endpoint(VERIFY_PATH);
        let body = VerifyRequest {
            access_token: self.config.access_token.expose(),
        };

        let (status, text) = self.post(&url, &body).await.map_err(BridgeError::credential)?;
        interpret_verify(status, &text)
    }

    async fn query(&self, request: &RemoteQueryRequest) -> Result<Vec<ToolMessage>> {
        if self.config.base_url.trim().is_empty() {
            return Err(BridgeError::remote_invocation("Base URL is not configured"));
        }

        let url = self.config.endpoint(QUERY_PATH);
        let (status, text) = self
            .post(&url, request)
            .await
            .map_err(BridgeError::remote_invocation)?;

        if status != 200 {
            warn!("Remote query returned HTTP {}: {}", status, text);
        }
        interpret_query(status, &text)
    }
}
