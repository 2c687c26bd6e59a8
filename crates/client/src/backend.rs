//! Transport seam between the engine and the backend.
//!
//! [`ComfyRemoteApi`](crate::api::ComfyRemoteApi) is the HTTP
//! implementation; tests substitute in-memory fakes.

use async_trait::async_trait;
use comfy_remote_core::job::{JobRecord, RunRequest};
use comfy_remote_core::schema::WorkflowSummary;

use crate::api::TransportError;

/// The REST surface consumed by the engine.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /workflows`
    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, TransportError>;

    /// `GET /workflow/{name}/introspect`, returned undecoded so schema
    /// validation stays in one place.
    async fn introspect(&self, workflow_name: &str) -> Result<serde_json::Value, TransportError>;

    /// `POST /run`
    async fn run(&self, request: &RunRequest) -> Result<JobRecord, TransportError>;

    /// `GET /history`
    async fn history(&self) -> Result<Vec<JobRecord>, TransportError>;

    /// `GET /checkpoints`
    async fn checkpoints(&self) -> Result<Vec<String>, TransportError>;

    /// `GET /loras`
    async fn loras(&self) -> Result<Vec<String>, TransportError>;
}
