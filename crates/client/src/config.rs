use std::time::Duration;

use crate::polling::PollConfig;

/// Default backend origin.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Origin for REST calls and image URLs.
    pub backend_url: String,
    /// Polling period in milliseconds.
    pub poll_interval_ms: u64,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Extra status strings that end tracking.
    pub terminal_statuses: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            terminal_statuses: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                              | Default                 |
    /// |--------------------------------------|-------------------------|
    /// | `COMFY_REMOTE_BACKEND_URL`           | `http://localhost:8000` |
    /// | `COMFY_REMOTE_POLL_INTERVAL_MS`      | `1000`                  |
    /// | `COMFY_REMOTE_REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `COMFY_REMOTE_TERMINAL_STATUSES`     | (none)                  |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("COMFY_REMOTE_BACKEND_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let poll_interval_ms = parse_or_default(
            &lookup,
            "COMFY_REMOTE_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MS,
        );

        let request_timeout_secs = parse_or_default(
            &lookup,
            "COMFY_REMOTE_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );

        let terminal_statuses: Vec<String> = lookup("COMFY_REMOTE_TERMINAL_STATUSES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            backend_url,
            poll_interval_ms,
            request_timeout_secs,
            terminal_statuses,
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            extra_terminal: self.terminal_statuses.clone(),
        }
    }
}

fn parse_or_default<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!(var = name, value = %raw, default, "Invalid value, using default");
                default
            }
        },
    }
}
