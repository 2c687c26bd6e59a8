//! Job tracking loop.
//!
//! After a run is accepted, [`PollingEngine::track`] spawns a task that
//! fetches the history once per tick, projects the tracked job's latest
//! record into the shared [`TrackingState`] and stops after a terminal
//! status, following it with one full-history refresh.
//!
//! Only one loop exists per engine. Tracking a new job cancels and awaits
//! the previous loop first, so two loops never write the projection
//! concurrently. Every loop runs under a child of the engine's
//! [`CancellationToken`]; cancelling the parent ends all of them.
//!
//! Tick failures and a missing job are not errors: they are reported
//! through [`Diagnostics`] and the loop waits for the next tick. There is
//! no deadline.

use std::sync::Arc;
use std::time::Duration;

use comfy_remote_core::diagnostics::{Diagnostic, Diagnostics};
use comfy_remote_core::history;
use comfy_remote_core::job::{JobRecord, JobStatus};
use comfy_remote_core::types::JobId;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::TransportError;
use crate::backend::Backend;
use crate::events::TrackingEvent;

/// Broadcast channel capacity for tracking events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long [`PollingEngine::stop`] waits for a cancelled loop to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracking loop configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay between ticks.
    pub interval: Duration,
    /// Status strings treated as terminal in addition to
    /// `completed` and `failed`. Compared case-insensitively.
    pub extra_terminal: Vec<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            extra_terminal: Vec::new(),
        }
    }
}

/// Projection shared between the engine and its loop.
#[derive(Debug, Clone, Default)]
pub struct TrackingState {
    /// Latest known record of the most recently submitted job.
    pub active_job: Option<JobRecord>,
    /// Last history listing fetched from the backend.
    pub history: Vec<JobRecord>,
}

/// How a tracking loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingOutcome {
    /// The job reached this terminal status.
    Finished(JobStatus),
    /// The loop was cancelled first.
    Cancelled,
}

/// Owned handle to the running loop.
struct TrackingHandle {
    job_id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<TrackingOutcome>,
}

/// Everything the spawned loop needs, moved into the task.
struct TrackingLoop {
    job_id: JobId,
    backend: Arc<dyn Backend>,
    config: PollConfig,
    state: Arc<RwLock<TrackingState>>,
    diagnostics: Diagnostics,
    event_tx: broadcast::Sender<TrackingEvent>,
    cancel: CancellationToken,
}

enum Tick {
    Pending,
    Terminal(JobStatus),
}

pub struct PollingEngine {
    backend: Arc<dyn Backend>,
    config: PollConfig,
    state: Arc<RwLock<TrackingState>>,
    /// Parent of every loop's token.
    cancel: CancellationToken,
    handle: Option<TrackingHandle>,
    diagnostics: Diagnostics,
    event_tx: broadcast::Sender<TrackingEvent>,
}

impl PollingEngine {
    pub fn new(backend: Arc<dyn Backend>, config: PollConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            config,
            state: Arc::new(RwLock::new(TrackingState::default())),
            cancel: CancellationToken::new(),
            handle: None,
            diagnostics: Diagnostics::new(),
            event_tx,
        }
    }

    /// Run every loop under a child of `parent`.
    pub fn with_cancellation(mut self, parent: CancellationToken) -> Self {
        self.cancel = parent;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Subscribe to tracking events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.event_tx.subscribe()
    }

    /// Make `job` the active job and start tracking it.
    ///
    /// Any previous loop is cancelled and awaited before the new one is
    /// spawned.
    pub async fn track(&mut self, job: JobRecord) {
        self.stop().await;

        let job_id = job.job_id.clone();
        self.state.write().await.active_job = Some(job);

        let cancel = self.cancel.child_token();
        let tracking = TrackingLoop {
            job_id: job_id.clone(),
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            diagnostics: self.diagnostics.clone(),
            event_tx: self.event_tx.clone(),
            cancel: cancel.clone(),
        };

        tracing::info!(
            job_id = %job_id,
            interval_ms = self.config.interval.as_millis() as u64,
            "Tracking started"
        );
        let _ = self.event_tx.send(TrackingEvent::Started {
            job_id: job_id.clone(),
        });

        let task = tokio::spawn(tracking.run());
        self.handle = Some(TrackingHandle {
            job_id,
            cancel,
            task,
        });
    }

    /// Cancel the current loop, if any, and wait for it to exit.
    pub async fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        if !handle.task.is_finished() {
            tracing::info!(job_id = %handle.job_id, "Stopping tracking loop");
        }
        handle.cancel.cancel();
        if tokio::time::timeout(STOP_TIMEOUT, handle.task).await.is_err() {
            tracing::warn!(job_id = %handle.job_id, "Tracking loop did not exit in time");
        }
    }

    /// Wait for the current loop to end on its own.
    ///
    /// Returns `None` when nothing is being tracked. The handle stays
    /// owned until the task has completed, so dropping this future
    /// leaves the loop stoppable.
    pub async fn wait(&mut self) -> Option<TrackingOutcome> {
        let handle = self.handle.as_mut()?;
        let joined = (&mut handle.task).await;
        let handle = self.handle.take()?;
        match joined {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(job_id = %handle.job_id, error = %e, "Tracking task failed");
                None
            }
        }
    }

    /// Whether a loop is still running.
    pub fn is_tracking(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Id of the job the current (or most recent) loop tracks.
    pub fn tracked_job_id(&self) -> Option<&str> {
        self.handle.as_ref().map(|handle| handle.job_id.as_str())
    }

    pub async fn active_job(&self) -> Option<JobRecord> {
        self.state.read().await.active_job.clone()
    }

    /// Last fetched history, as returned by the backend.
    pub async fn history(&self) -> Vec<JobRecord> {
        self.state.read().await.history.clone()
    }

    /// Active job first, then the history without its duplicate.
    pub async fn merged_history(&self) -> Vec<JobRecord> {
        let state = self.state.read().await;
        history::merge(&state.history, state.active_job.as_ref())
    }

    /// Fetch the history and store it.
    ///
    /// Only the history list is replaced. The active job belongs to the
    /// tracking loop, which may have observed a newer status than this
    /// response carries.
    pub async fn refresh_history(&self) -> Result<Vec<JobRecord>, TransportError> {
        let records = self.backend.history().await?;
        tracing::debug!(count = records.len(), "History refreshed");

        self.state.write().await.history = records.clone();
        Ok(records)
    }

    /// Stop tracking and forget the active job. The history is kept.
    pub async fn clear_active(&mut self) {
        self.stop().await;
        self.state.write().await.active_job = None;
    }
}

impl Drop for PollingEngine {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.cancel.cancel();
        }
    }
}

impl TrackingLoop {
    async fn run(self) -> TrackingOutcome {
        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled();
            }

            if let Tick::Terminal(status) = self.tick().await {
                self.final_refresh().await;
                tracing::info!(job_id = %self.job_id, status = %status, "Tracking finished");
                let _ = self.event_tx.send(TrackingEvent::Finished {
                    job_id: self.job_id.clone(),
                    status: status.clone(),
                });
                return TrackingOutcome::Finished(status);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return self.cancelled(),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// Fetch the history once and project the tracked job.
    async fn tick(&self) -> Tick {
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Tick::Pending,
            result = self.backend.history() => result,
        };

        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                self.diagnostics.emit(Diagnostic::PollTickFailed {
                    job_id: self.job_id.clone(),
                    error: e.to_string(),
                });
                return Tick::Pending;
            }
        };

        let Some(record) = records.into_iter().find(|r| r.job_id == self.job_id) else {
            self.diagnostics.emit(Diagnostic::TrackedJobMissing {
                job_id: self.job_id.clone(),
            });
            return Tick::Pending;
        };

        tracing::debug!(job_id = %self.job_id, status = %record.status, "Tracked job observed");

        let status = record.status.clone();
        {
            let mut state = self.state.write().await;
            if self.cancel.is_cancelled() {
                return Tick::Pending;
            }
            state.active_job = Some(record.clone());
        }
        let _ = self.event_tx.send(TrackingEvent::JobUpdated(record));

        if status.is_terminal_with(&self.config.extra_terminal) {
            Tick::Terminal(status)
        } else {
            Tick::Pending
        }
    }

    /// One full-history refresh after the terminal tick.
    async fn final_refresh(&self) {
        match self.backend.history().await {
            Ok(records) => {
                let mut state = self.state.write().await;
                if !self.cancel.is_cancelled() {
                    apply_history(&mut state, records);
                }
            }
            Err(e) => {
                self.diagnostics.emit(Diagnostic::FinalRefreshFailed {
                    job_id: self.job_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn cancelled(&self) -> TrackingOutcome {
        tracing::info!(job_id = %self.job_id, "Tracking cancelled");
        let _ = self.event_tx.send(TrackingEvent::Cancelled {
            job_id: self.job_id.clone(),
        });
        TrackingOutcome::Cancelled
    }
}

/// Store `records` as the history and refresh the active job from it.
/// Only the tracking loop calls this.
fn apply_history(state: &mut TrackingState, records: Vec<JobRecord>) {
    if let Some(active) = state.active_job.as_mut() {
        if let Some(fresh) = records.iter().find(|r| r.job_id == active.job_id) {
            *active = fresh.clone();
        }
    }
    state.history = records;
}
