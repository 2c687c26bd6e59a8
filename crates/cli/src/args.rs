use clap::{Parser, Subcommand};
use comfy_remote_core::types::ValueKey;

#[derive(Debug, Parser)]
#[command(name = "comfy-remote", about = "Run ComfyUI workflows on a remote backend")]
pub struct Args {
    /// Backend origin, overriding the environment.
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the workflows the backend offers.
    List,

    /// List available checkpoints and LoRAs.
    Models,

    /// Show the editable inputs of a workflow and their defaults.
    Inspect {
        workflow: String,
    },

    /// Submit a workflow and follow it to completion.
    Run {
        workflow: String,

        /// Fixed seed; the server picks one when omitted.
        #[arg(long)]
        seed: Option<i64>,

        /// Set an input from text, e.g. `3.steps=30`.
        #[arg(long = "set", value_name = "NODE.INPUT=VALUE", value_parser = parse_assignment)]
        sets: Vec<(ValueKey, String)>,

        /// Select a checkpoint, e.g. `4.ckpt_name=sdxl.safetensors`.
        #[arg(long = "checkpoint", value_name = "NODE.INPUT=NAME", value_parser = parse_assignment)]
        checkpoints: Vec<(ValueKey, String)>,

        /// Select a LoRA, e.g. `10.lora_1=detail.safetensors`.
        #[arg(long = "lora", value_name = "NODE.INPUT=NAME", value_parser = parse_assignment)]
        loras: Vec<(ValueKey, String)>,

        /// Remove a LoRA selection.
        #[arg(long = "clear-lora", value_name = "NODE.INPUT", value_parser = parse_key)]
        clear_loras: Vec<ValueKey>,

        /// Return right after submission.
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the job history.
    History,
}

/// `node.input=value`, split at the first `=`.
pub fn parse_assignment(s: &str) -> Result<(ValueKey, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NODE.INPUT=VALUE, got '{s}'"))?;
    Ok((parse_key(key.trim())?, value.to_string()))
}

pub fn parse_key(s: &str) -> Result<ValueKey, String> {
    s.parse().map_err(|e: comfy_remote_core::error::StoreError| e.to_string())
}
