//! Job records and run requests.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::seed::{SeedControl, SeedSelection};
use crate::types::JobId;
use crate::value::InputValue;

/// Status string reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// Any other reported status. Non-terminal unless configured.
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }

    /// `completed` and `failed` end tracking.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Like [`is_terminal`](Self::is_terminal), also treating any status in
    /// `extra` (case-insensitive) as terminal.
    pub fn is_terminal_with(&self, extra: &[String]) -> bool {
        self.is_terminal() || extra.iter().any(|s| s.eq_ignore_ascii_case(self.as_str()))
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The server's representation of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub workflow_name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub resolved_inputs: IndexMap<String, InputValue>,
    pub resolved_seed: i64,
    /// Relative path of the produced image, once there is one.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl JobRecord {
    /// [`image_url`](Self::image_url) resolved against `origin`.
    pub fn resolved_image_url(&self, origin: &str) -> Option<String> {
        self.image_url
            .as_deref()
            .map(|path| resolve_image_url(origin, path))
    }
}

/// Body of `POST /run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub workflow_name: String,
    pub inputs: IndexMap<String, InputValue>,
    pub seed_control: SeedControl,
}

impl RunRequest {
    pub fn new(
        workflow_name: impl Into<String>,
        inputs: IndexMap<String, InputValue>,
        seed: SeedSelection,
    ) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            inputs,
            seed_control: seed.to_control(),
        }
    }
}

/// Join a relative image path onto the backend origin.
///
/// Absolute `http(s)://` URLs are returned unchanged.
pub fn resolve_image_url(origin: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
