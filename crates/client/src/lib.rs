//! Async client for the ComfyUI remote-run backend.
//!
//! Provides the REST API wrapper, the [`backend::Backend`] seam it
//! implements, job submission, the polling engine that tracks a job to
//! a terminal state, and [`session::WorkflowSession`], which ties them
//! to a value store for one workflow-viewing context.

pub mod api;
pub mod backend;
pub mod config;
pub mod events;
pub mod job_client;
pub mod polling;
pub mod session;
