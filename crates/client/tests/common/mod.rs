//! In-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use comfy_remote_client::api::TransportError;
use comfy_remote_client::backend::Backend;
use comfy_remote_core::job::{JobRecord, JobStatus, RunRequest};
use comfy_remote_core::schema::WorkflowSummary;
use serde_json::json;

/// Scripted [`Backend`].
///
/// `history()` pops queued responses first and then keeps returning the
/// current listing; a queued delay holds the response back after it has
/// been read. `run()` echoes the request into a job record unless a
/// failure was queued.
#[derive(Default)]
pub struct FakeBackend {
    workflows: Mutex<Vec<WorkflowSummary>>,
    introspections: Mutex<HashMap<String, serde_json::Value>>,
    history_queue: Mutex<VecDeque<Result<Vec<JobRecord>, u16>>>,
    history_current: Mutex<Vec<JobRecord>>,
    history_delays: Mutex<VecDeque<Duration>>,
    run_failures: Mutex<VecDeque<u16>>,
    run_requests: Mutex<Vec<RunRequest>>,
    checkpoints: Mutex<Option<Vec<String>>>,
    loras: Mutex<Option<Vec<String>>>,
    history_calls: AtomicUsize,
    next_job: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow(self, name: &str, introspection: serde_json::Value) -> Self {
        self.introspections
            .lock()
            .unwrap()
            .insert(name.to_string(), introspection);
        self.workflows.lock().unwrap().push(WorkflowSummary {
            file_name: name.to_string(),
            name: name.trim_end_matches(".json").to_string(),
            last_modified: "2024-05-01T12:00:00Z".to_string(),
        });
        self
    }

    pub fn with_catalogs(self, checkpoints: &[&str], loras: &[&str]) -> Self {
        *self.checkpoints.lock().unwrap() =
            Some(checkpoints.iter().map(|s| s.to_string()).collect());
        *self.loras.lock().unwrap() = Some(loras.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn set_history(&self, records: Vec<JobRecord>) {
        *self.history_current.lock().unwrap() = records;
    }

    pub fn queue_history(&self, records: Vec<JobRecord>) {
        self.history_queue.lock().unwrap().push_back(Ok(records));
    }

    pub fn queue_history_failure(&self, status: u16) {
        self.history_queue.lock().unwrap().push_back(Err(status));
    }

    pub fn delay_next_history(&self, delay: Duration) {
        self.history_delays.lock().unwrap().push_back(delay);
    }

    pub fn fail_next_run(&self, status: u16) {
        self.run_failures.lock().unwrap().push_back(status);
    }

    pub fn fail_catalogs(&self) {
        *self.checkpoints.lock().unwrap() = None;
        *self.loras.lock().unwrap() = None;
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn run_requests(&self) -> Vec<RunRequest> {
        self.run_requests.lock().unwrap().clone()
    }
}

fn status_error(status: u16) -> TransportError {
    TransportError::Status {
        status,
        body: "scripted failure".to_string(),
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, TransportError> {
        Ok(self.workflows.lock().unwrap().clone())
    }

    async fn introspect(&self, workflow_name: &str) -> Result<serde_json::Value, TransportError> {
        self.introspections
            .lock()
            .unwrap()
            .get(workflow_name)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn run(&self, request: &RunRequest) -> Result<JobRecord, TransportError> {
        if let Some(status) = self.run_failures.lock().unwrap().pop_front() {
            return Err(status_error(status));
        }
        self.run_requests.lock().unwrap().push(request.clone());

        let n = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(JobRecord {
            job_id: format!("job-{n}"),
            workflow_name: request.workflow_name.clone(),
            status: JobStatus::Queued,
            resolved_inputs: request.inputs.clone(),
            resolved_seed: request.seed_control.value.unwrap_or(1234),
            image_url: None,
        })
    }

    async fn history(&self) -> Result<Vec<JobRecord>, TransportError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.history_delays.lock().unwrap().pop_front();
        let queued = self.history_queue.lock().unwrap().pop_front();
        let result = match queued {
            Some(next) => next.map_err(status_error),
            None => Ok(self.history_current.lock().unwrap().clone()),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn checkpoints(&self) -> Result<Vec<String>, TransportError> {
        self.checkpoints
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| status_error(500))
    }

    async fn loras(&self) -> Result<Vec<String>, TransportError> {
        self.loras
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| status_error(500))
    }
}

pub fn job(id: &str, status: &str) -> JobRecord {
    JobRecord {
        job_id: id.to_string(),
        workflow_name: "txt2img.json".to_string(),
        status: JobStatus::from(status),
        resolved_inputs: Default::default(),
        resolved_seed: 0,
        image_url: None,
    }
}

/// Sampler, checkpoint loader and a LoRA loader with a header widget.
pub fn txt2img_introspection() -> serde_json::Value {
    json!({"nodes": [
        {"id": "3", "type": "KSampler", "inputs": [
            {"name": "seed", "type": "INT", "default": 0, "is_seed": true},
            {"name": "steps", "type": "INT", "default": 20},
            {"name": "cfg", "type": "FLOAT", "default": 7.5}
        ]},
        {"id": "4", "type": "CheckpointLoaderSimple", "label": "Model", "inputs": [
            {"name": "ckpt_name", "type": "STRING", "default": "sd\\base.safetensors"}
        ]},
        {"id": "10", "type": "Power Lora Loader", "inputs": [
            {"name": "lora_1", "type": "OBJECT",
             "default": {"on": false, "lora": "None", "strength": 1.0}},
            {"name": "PowerLoraLoaderHeaderWidget", "type": "OBJECT",
             "default": {"type": "PowerLoraLoaderHeaderWidget"}}
        ]}
    ]})
}

pub fn upscale_introspection() -> serde_json::Value {
    json!({"nodes": [
        {"id": "1", "type": "LoadImage", "inputs": [
            {"name": "image", "type": "STRING", "default": "input.png"}
        ]}
    ]})
}
