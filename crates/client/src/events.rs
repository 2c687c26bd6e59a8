//! Events emitted by the polling engine.
//!
//! Delivered over a [`tokio::sync::broadcast`] channel; subscribe via
//! [`PollingEngine::subscribe`](crate::polling::PollingEngine::subscribe).

use comfy_remote_core::job::{JobRecord, JobStatus};
use comfy_remote_core::types::JobId;

#[derive(Debug, Clone)]
pub enum TrackingEvent {
    /// A tracking loop started for a freshly submitted job.
    Started { job_id: JobId },

    /// A tick observed the tracked job (fields may have changed).
    JobUpdated(JobRecord),

    /// The job reached a terminal status and the final refresh ran.
    Finished { job_id: JobId, status: JobStatus },

    /// The loop was cancelled before the job finished.
    Cancelled { job_id: JobId },
}
