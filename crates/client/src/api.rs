//! REST API client for the remote-run backend.
//!
//! Wraps the backend's HTTP endpoints (workflow listing, introspection,
//! run submission, history, model catalogues) using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use comfy_remote_core::job::{JobRecord, RunRequest};
use comfy_remote_core::schema::WorkflowSummary;
use serde::Deserialize;

use crate::backend::Backend;
use crate::config::ClientConfig;

/// HTTP client for one backend origin.
#[derive(Debug, Clone)]
pub struct ComfyRemoteApi {
    client: reqwest::Client,
    base_url: String,
}

/// Body of `GET /checkpoints`.
#[derive(Debug, Deserialize)]
struct CheckpointsResponse {
    checkpoints: Vec<String>,
}

/// Body of `GET /loras`.
#[derive(Debug, Deserialize)]
struct LorasResponse {
    loras: Vec<String>,
}

/// Network or decoding failure on any backend call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// The configured origin cannot be used as a base URL.
    #[error("Invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ComfyRemoteApi {
    /// Create a client for a backend origin, e.g. `http://host:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create a client with the configured origin and request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config.backend_url.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    /// Build `base_url` + percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, TransportError> {
        let invalid = |reason: String| TransportError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };

        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<T, TransportError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`TransportError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Backend for ComfyRemoteApi {
    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, TransportError> {
        self.get_json(&["workflows"]).await
    }

    async fn introspect(&self, workflow_name: &str) -> Result<serde_json::Value, TransportError> {
        self.get_json(&["workflow", workflow_name, "introspect"]).await
    }

    async fn run(&self, request: &RunRequest) -> Result<JobRecord, TransportError> {
        let url = self.endpoint(&["run"])?;
        tracing::debug!(url = %url, workflow = %request.workflow_name, "POST");
        let response = self.client.post(url).json(request).send().await?;
        Self::parse_response(response).await
    }

    async fn history(&self) -> Result<Vec<JobRecord>, TransportError> {
        self.get_json(&["history"]).await
    }

    async fn checkpoints(&self) -> Result<Vec<String>, TransportError> {
        let body: CheckpointsResponse = self.get_json(&["checkpoints"]).await?;
        Ok(body.checkpoints)
    }

    async fn loras(&self) -> Result<Vec<String>, TransportError> {
        let body: LorasResponse = self.get_json(&["loras"]).await?;
        Ok(body.loras)
    }
}
