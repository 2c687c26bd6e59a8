//! Run submission.

use std::sync::Arc;

use comfy_remote_core::job::{JobRecord, RunRequest};
use comfy_remote_core::schema::WorkflowSchema;
use comfy_remote_core::seed::SeedSelection;
use comfy_remote_core::store::ValueStore;
use comfy_remote_core::value::InputValue;
use indexmap::IndexMap;

use crate::api::TransportError;
use crate::backend::Backend;

/// Builds run requests and sends them. Never retries.
#[derive(Clone)]
pub struct JobClient {
    backend: Arc<dyn Backend>,
}

impl JobClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Snapshot `store` under `schema` and submit it.
    ///
    /// The snapshot is a detached copy taken now; later edits to the
    /// store never reach this request.
    pub async fn submit(
        &self,
        schema: &WorkflowSchema,
        store: &ValueStore,
        seed: SeedSelection,
    ) -> Result<JobRecord, TransportError> {
        let inputs = store.snapshot(schema);
        self.submit_snapshot(&schema.workflow_name, inputs, seed).await
    }

    /// Submit an already-flattened snapshot.
    pub async fn submit_snapshot(
        &self,
        workflow_name: &str,
        inputs: IndexMap<String, InputValue>,
        seed: SeedSelection,
    ) -> Result<JobRecord, TransportError> {
        let request = RunRequest::new(workflow_name, inputs, seed);

        tracing::info!(
            workflow = %workflow_name,
            inputs = request.inputs.len(),
            seed_mode = ?request.seed_control.mode,
            "Submitting workflow run",
        );

        let job = self.backend.run(&request).await.map_err(|e| {
            tracing::error!(workflow = %workflow_name, error = %e, "Run submission failed");
            e
        })?;

        tracing::info!(
            workflow = %workflow_name,
            job_id = %job.job_id,
            status = %job.status,
            resolved_seed = job.resolved_seed,
            "Workflow run accepted",
        );

        Ok(job)
    }
}
