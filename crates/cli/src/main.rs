//! `comfy-remote` -- command-line driver for remote ComfyUI workflows.
//!
//! Lists workflows and models, inspects a workflow's editable inputs and
//! runs it, following the job until it finishes.
//!
//! # Environment variables
//!
//! | Variable                            | Default                 | Description                          |
//! |-------------------------------------|-------------------------|--------------------------------------|
//! | `COMFY_REMOTE_BACKEND_URL`          | `http://localhost:8000` | Backend origin (`--backend-url` wins) |
//! | `COMFY_REMOTE_POLL_INTERVAL_MS`     | `1000`                  | Delay between status polls           |
//! | `COMFY_REMOTE_REQUEST_TIMEOUT_SECS` | `30`                    | HTTP request timeout                 |
//! | `COMFY_REMOTE_TERMINAL_STATUSES`    | --                      | Extra statuses that end tracking     |
//! | `RUST_LOG`                          | `comfy_remote=info`     | Log filter                           |

mod args;

use anyhow::Context;
use clap::Parser;
use comfy_remote_client::config::ClientConfig;
use comfy_remote_client::events::TrackingEvent;
use comfy_remote_client::polling::TrackingOutcome;
use comfy_remote_client::session::WorkflowSession;
use comfy_remote_core::heuristics::{self, Category};
use comfy_remote_core::job::JobRecord;
use comfy_remote_core::seed::SeedSelection;
use comfy_remote_core::store::ScalarUpdate;
use comfy_remote_core::types::ValueKey;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comfy_remote=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }

    tracing::debug!(backend_url = %config.backend_url, "Starting comfy-remote");

    let mut session =
        WorkflowSession::from_config(&config).context("Failed to create HTTP client")?;

    let result = match args.command {
        Command::List => list(&mut session).await,
        Command::Models => models(&mut session).await,
        Command::Inspect { workflow } => inspect(&mut session, &workflow).await,
        Command::Run {
            workflow,
            seed,
            sets,
            checkpoints,
            loras,
            clear_loras,
            no_wait,
        } => {
            let edits = Edits {
                sets,
                checkpoints,
                loras,
                clear_loras,
            };
            let seed = seed.map(SeedSelection::Fixed).unwrap_or_default();
            run(&mut session, &workflow, edits, seed, no_wait).await
        }
        Command::History => history(&mut session).await,
    };

    session.close().await;
    result
}

/// Input changes requested on the command line.
struct Edits {
    sets: Vec<(ValueKey, String)>,
    checkpoints: Vec<(ValueKey, String)>,
    loras: Vec<(ValueKey, String)>,
    clear_loras: Vec<ValueKey>,
}

async fn list(session: &mut WorkflowSession) -> anyhow::Result<()> {
    let workflows = session
        .list_workflows()
        .await
        .context("Failed to list workflows")?;

    for workflow in workflows {
        let modified = workflow
            .last_modified_at()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| workflow.last_modified.clone());
        println!("{:<40} {:<30} {}", workflow.file_name, workflow.name, modified);
    }
    Ok(())
}

async fn models(session: &mut WorkflowSession) -> anyhow::Result<()> {
    session.refresh_catalogs().await;

    println!("Checkpoints:");
    for name in session.checkpoints() {
        println!("  {}", heuristics::display_name(name));
    }
    println!("LoRAs:");
    for name in session.loras() {
        println!("  {}", heuristics::display_name(name));
    }
    Ok(())
}

async fn inspect(session: &mut WorkflowSession, workflow: &str) -> anyhow::Result<()> {
    let schema = session
        .open(workflow)
        .await
        .with_context(|| format!("Failed to open workflow '{workflow}'"))?
        .clone();

    for (node, input, category) in schema.editable_inputs() {
        let key = ValueKey::new(node.id.clone(), input.name.clone());
        let value = session.display_value(&key).unwrap_or_default();
        println!(
            "{:<20} {:<24} {:<8} {:<11} {}",
            key.to_string(),
            node.display_label(),
            input.declared_type.as_str(),
            category_label(category),
            value,
        );
    }
    Ok(())
}

async fn run(
    session: &mut WorkflowSession,
    workflow: &str,
    edits: Edits,
    seed: SeedSelection,
    no_wait: bool,
) -> anyhow::Result<()> {
    session
        .open(workflow)
        .await
        .with_context(|| format!("Failed to open workflow '{workflow}'"))?;

    for (key, name) in &edits.checkpoints {
        session.set_checkpoint(key, name)?;
    }
    for (key, name) in &edits.loras {
        session.set_lora(key, name)?;
    }
    for key in &edits.clear_loras {
        session.clear_lora(key)?;
    }
    for (key, raw) in &edits.sets {
        if session.set_scalar(key, raw)? == ScalarUpdate::Skipped {
            tracing::warn!(key = %key, value = %raw, "Value does not parse, keeping default");
        }
    }
    session.set_seed(seed);

    let mut events = session.subscribe();
    let job = session.run().await.context("Failed to submit run")?;
    println!("Submitted {} (seed {})", job.job_id, job.resolved_seed);

    if no_wait {
        return Ok(());
    }

    let outcome = {
        let wait = session.wait_for_active();
        tokio::pin!(wait);
        loop {
            tokio::select! {
                outcome = &mut wait => break outcome,
                Ok(event) = events.recv() => report(&event),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, no longer following the job");
                    break Some(TrackingOutcome::Cancelled);
                }
            }
        }
    };

    if outcome == Some(TrackingOutcome::Cancelled) {
        return Ok(());
    }

    if let Some(active) = session.active_job().await {
        print_job(session, &active);
    }
    Ok(())
}

async fn history(session: &mut WorkflowSession) -> anyhow::Result<()> {
    let jobs = session
        .refresh_history()
        .await
        .context("Failed to load history")?;

    for job in &jobs {
        print_job(session, job);
    }
    Ok(())
}

fn report(event: &TrackingEvent) {
    if let TrackingEvent::JobUpdated(job) = event {
        println!("  {} {}", job.job_id, job.status);
    }
}

fn print_job(session: &WorkflowSession, job: &JobRecord) {
    let image = session.image_url(job).unwrap_or_else(|| "-".to_string());
    println!(
        "{:<38} {:<24} {:<10} seed={:<12} {}",
        job.job_id,
        job.workflow_name,
        job.status.as_str(),
        job.resolved_seed,
        image
    );
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::CheckpointSelect => "checkpoint",
        Category::LoraSelect => "lora",
        Category::Seed => "seed",
        Category::Suppressed => "hidden",
        Category::Plain => "value",
    }
}
