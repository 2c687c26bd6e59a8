//! One workflow-viewing context.
//!
//! [`WorkflowSession`] ties the pieces together for a driver (CLI, GUI):
//! it opens a workflow (introspection, value defaults, history and model
//! catalogues), forwards edits to the [`ValueStore`], submits runs and
//! keeps the resulting job tracked until it finishes.
//!
//! The session owns a root [`CancellationToken`]. Closing or dropping it
//! cancels every tracking loop it started.

use std::sync::Arc;

use comfy_remote_core::diagnostics::Diagnostics;
use comfy_remote_core::error::{SchemaError, StoreError};
use comfy_remote_core::heuristics;
use comfy_remote_core::job::JobRecord;
use comfy_remote_core::schema::{WorkflowSchema, WorkflowSummary};
use comfy_remote_core::seed::SeedSelection;
use comfy_remote_core::store::{ScalarUpdate, ValueStore};
use comfy_remote_core::types::ValueKey;
use comfy_remote_core::value::InputValue;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::{ComfyRemoteApi, TransportError};
use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::events::TrackingEvent;
use crate::job_client::JobClient;
use crate::polling::{PollConfig, PollingEngine, TrackingOutcome};

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No workflow is open")]
    NoWorkflowOpen,
}

pub struct WorkflowSession {
    backend: Arc<dyn Backend>,
    /// Origin that relative image paths resolve against.
    origin: String,
    schema: Option<WorkflowSchema>,
    store: ValueStore,
    seed: SeedSelection,
    jobs: JobClient,
    polling: PollingEngine,
    workflows: Vec<WorkflowSummary>,
    checkpoints: Vec<String>,
    loras: Vec<String>,
    /// Message of the most recent failed operation.
    last_error: Option<String>,
    cancel: CancellationToken,
}

impl WorkflowSession {
    pub fn new(backend: Arc<dyn Backend>, origin: impl Into<String>, poll: PollConfig) -> Self {
        Self::with_diagnostics(backend, origin, poll, Diagnostics::new())
    }

    /// Like [`new`](Self::new), reporting skipped input text and
    /// swallowed polling failures to `diagnostics`.
    pub fn with_diagnostics(
        backend: Arc<dyn Backend>,
        origin: impl Into<String>,
        poll: PollConfig,
        diagnostics: Diagnostics,
    ) -> Self {
        let cancel = CancellationToken::new();
        let polling = PollingEngine::new(Arc::clone(&backend), poll)
            .with_cancellation(cancel.clone())
            .with_diagnostics(diagnostics.clone());

        Self {
            jobs: JobClient::new(Arc::clone(&backend)),
            backend,
            origin: origin.into(),
            schema: None,
            store: ValueStore::with_diagnostics(diagnostics),
            seed: SeedSelection::default(),
            polling,
            workflows: Vec::new(),
            checkpoints: Vec::new(),
            loras: Vec::new(),
            last_error: None,
            cancel,
        }
    }

    /// Session over the HTTP backend described by `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let api = ComfyRemoteApi::from_config(config)?;
        Ok(Self::new(
            Arc::new(api),
            config.backend_url.clone(),
            config.poll_config(),
        ))
    }

    // -- accessors -------------------------------------------------------

    pub fn schema(&self) -> Option<&WorkflowSchema> {
        self.schema.as_ref()
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn value(&self, key: &ValueKey) -> Option<&InputValue> {
        self.store.get(key)
    }

    /// Stored value of `key` rendered for display.
    pub fn display_value(&self, key: &ValueKey) -> Option<String> {
        let schema = self.schema.as_ref()?;
        let category = ValueStore::category_of(schema, key)?;
        self.store
            .get(key)
            .map(|value| heuristics::display_value(category, value))
    }

    pub fn seed(&self) -> SeedSelection {
        self.seed
    }

    pub fn workflows(&self) -> &[WorkflowSummary] {
        &self.workflows
    }

    pub fn checkpoints(&self) -> &[String] {
        &self.checkpoints
    }

    pub fn loras(&self) -> &[String] {
        &self.loras
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    // -- loading ---------------------------------------------------------

    /// Fetch the workflow listing.
    pub async fn list_workflows(&mut self) -> Result<&[WorkflowSummary], SessionError> {
        self.last_error = None;
        match self.backend.list_workflows().await {
            Ok(workflows) => {
                tracing::debug!(count = workflows.len(), "Workflows listed");
                self.workflows = workflows;
                Ok(&self.workflows)
            }
            Err(e) => Err(self.record(e)),
        }
    }

    /// Introspect `workflow_name` and make it the current workflow.
    ///
    /// Opening a different workflow stops tracking and forgets the active
    /// job. On any failure the schema becomes absent. On success the
    /// store is rebound (stale keys dropped, missing defaults seeded) and
    /// the history and model catalogues are refreshed best-effort.
    pub async fn open(&mut self, workflow_name: &str) -> Result<&WorkflowSchema, SessionError> {
        self.last_error = None;

        let switching = self
            .schema
            .as_ref()
            .is_none_or(|schema| schema.workflow_name != workflow_name);
        if switching {
            self.polling.clear_active().await;
        }

        let schema = match self.introspect(workflow_name).await {
            Ok(schema) => schema,
            Err(e) => {
                self.schema = None;
                return Err(self.record(e));
            }
        };

        tracing::info!(
            workflow = %workflow_name,
            nodes = schema.nodes.len(),
            "Workflow opened",
        );

        self.store.load_schema(&schema);
        self.schema = Some(schema);

        if let Err(e) = self.polling.refresh_history().await {
            tracing::warn!(error = %e, "Failed to load history");
        }
        self.refresh_catalogs().await;

        self.schema.as_ref().ok_or(SessionError::NoWorkflowOpen)
    }

    /// Reload the checkpoint and LoRA listings. A failed listing is
    /// logged and the previous one kept.
    pub async fn refresh_catalogs(&mut self) {
        match self.backend.checkpoints().await {
            Ok(list) => self.checkpoints = list,
            Err(e) => tracing::warn!(error = %e, "Failed to load checkpoints"),
        }
        match self.backend.loras().await {
            Ok(list) => self.loras = list,
            Err(e) => tracing::warn!(error = %e, "Failed to load LoRAs"),
        }
    }

    // -- editing ---------------------------------------------------------

    /// Assign raw text, coerced by the input's declared type.
    pub fn set_scalar(&mut self, key: &ValueKey, raw: &str) -> Result<ScalarUpdate, SessionError> {
        let schema = self.schema.as_ref().ok_or(SessionError::NoWorkflowOpen)?;
        let spec = schema
            .input(key)
            .ok_or_else(|| StoreError::UnknownInput(key.clone()))?;
        Ok(self.store.set_scalar(key, raw, spec.declared_type)?)
    }

    pub fn set_value(&mut self, key: &ValueKey, value: InputValue) -> Result<(), SessionError> {
        self.require_schema()?;
        Ok(self.store.set_value(key, value)?)
    }

    pub fn set_checkpoint(&mut self, key: &ValueKey, chosen: &str) -> Result<(), SessionError> {
        self.require_schema()?;
        Ok(self.store.set_checkpoint(key, chosen)?)
    }

    pub fn set_lora(&mut self, key: &ValueKey, chosen: &str) -> Result<(), SessionError> {
        self.require_schema()?;
        Ok(self.store.set_lora(key, chosen)?)
    }

    pub fn clear_lora(&mut self, key: &ValueKey) -> Result<(), SessionError> {
        self.require_schema()?;
        Ok(self.store.clear_lora(key)?)
    }

    pub fn set_seed(&mut self, seed: SeedSelection) {
        self.seed = seed;
    }

    // -- running ---------------------------------------------------------

    /// Submit the current values and start tracking the new job.
    ///
    /// A failed submission leaves the history and any running loop alone.
    pub async fn run(&mut self) -> Result<JobRecord, SessionError> {
        self.last_error = None;
        let Some(schema) = self.schema.as_ref() else {
            return Err(self.record(SessionError::NoWorkflowOpen));
        };

        match self.jobs.submit(schema, &self.store, self.seed).await {
            Ok(job) => {
                self.polling.track(job.clone()).await;
                Ok(job)
            }
            Err(e) => Err(self.record(e)),
        }
    }

    pub async fn active_job(&self) -> Option<JobRecord> {
        self.polling.active_job().await
    }

    /// History for display: the active job first, no repeated ids.
    pub async fn history(&self) -> Vec<JobRecord> {
        self.polling.merged_history().await
    }

    pub async fn refresh_history(&mut self) -> Result<Vec<JobRecord>, SessionError> {
        self.last_error = None;
        match self.polling.refresh_history().await {
            Ok(_) => Ok(self.polling.merged_history().await),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Absolute URL of `job`'s image, if it has one.
    pub fn image_url(&self, job: &JobRecord) -> Option<String> {
        job.resolved_image_url(&self.origin)
    }

    pub fn is_tracking(&self) -> bool {
        self.polling.is_tracking()
    }

    /// Wait until the tracked job finishes (or its loop is cancelled).
    pub async fn wait_for_active(&mut self) -> Option<TrackingOutcome> {
        self.polling.wait().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.polling.subscribe()
    }

    /// End the session: every tracking loop is cancelled and awaited.
    pub async fn close(&mut self) {
        tracing::info!("Closing workflow session");
        self.cancel.cancel();
        self.polling.stop().await;
    }

    // ---- private helpers ----

    async fn introspect(&self, workflow_name: &str) -> Result<WorkflowSchema, SessionError> {
        let payload = self.backend.introspect(workflow_name).await?;
        Ok(WorkflowSchema::parse(workflow_name, &payload)?)
    }

    fn require_schema(&self) -> Result<(), SessionError> {
        self.schema
            .as_ref()
            .map(|_| ())
            .ok_or(SessionError::NoWorkflowOpen)
    }

    /// Remember `error` as the last failure and hand it back.
    fn record(&mut self, error: impl Into<SessionError>) -> SessionError {
        let error = error.into();
        tracing::error!(error = %error, "Session operation failed");
        self.last_error = Some(error.to_string());
        error
    }
}

impl Drop for WorkflowSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
