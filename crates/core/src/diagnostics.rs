//! Observable record of policies that are silent by default.
//!
//! Invalid numeric text is ignored by the value store and failed polling
//! ticks are swallowed by the tracking loop. Neither surfaces an error,
//! but both are reported here: always as a `tracing` event, and to an
//! optional caller-supplied callback.

use std::fmt;
use std::sync::Arc;

use crate::schema::DeclaredType;
use crate::types::{JobId, ValueKey};

/// Something that was deliberately not treated as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// `set_scalar` could not coerce the text; the prior value was kept.
    ScalarParseSkipped {
        key: ValueKey,
        raw: String,
        declared_type: DeclaredType,
    },
    /// A polling tick did not find the tracked job in the history.
    TrackedJobMissing { job_id: JobId },
    /// A polling tick failed; the loop waits for the next tick.
    PollTickFailed { job_id: JobId, error: String },
    /// The refresh after a terminal status failed.
    FinalRefreshFailed { job_id: JobId, error: String },
}

/// Callback receiving every [`Diagnostic`].
pub type DiagnosticSink = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// Cheaply cloneable diagnostics handle.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<DiagnosticSink>,
}

impl Diagnostics {
    /// Handle that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that logs and forwards to `sink`.
    pub fn with_sink(sink: DiagnosticSink) -> Self {
        Self { sink: Some(sink) }
    }

    /// Convenience over [`with_sink`](Self::with_sink) for plain closures.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        Self::with_sink(Arc::new(f))
    }

    pub fn emit(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::ScalarParseSkipped {
                key,
                raw,
                declared_type,
            } => {
                tracing::warn!(
                    key = %key,
                    raw = %raw,
                    declared_type = declared_type.as_str(),
                    "Ignoring unparseable input text",
                );
            }
            Diagnostic::TrackedJobMissing { job_id } => {
                tracing::debug!(job_id = %job_id, "Tracked job not in history yet");
            }
            Diagnostic::PollTickFailed { job_id, error } => {
                tracing::warn!(job_id = %job_id, error = %error, "Polling tick failed");
            }
            Diagnostic::FinalRefreshFailed { job_id, error } => {
                tracing::warn!(job_id = %job_id, error = %error, "Final history refresh failed");
            }
        }

        if let Some(sink) = &self.sink {
            sink(&diagnostic);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sink", &self.sink.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emit_without_sink_does_not_panic() {
        Diagnostics::new().emit(Diagnostic::TrackedJobMissing {
            job_id: "j1".into(),
        });
    }

    #[test]
    fn emit_forwards_to_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let diagnostics = Diagnostics::from_fn(move |d| seen_clone.lock().unwrap().push(d.clone()));

        diagnostics.emit(Diagnostic::PollTickFailed {
            job_id: "j1".into(),
            error: "boom".into(),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], Diagnostic::PollTickFailed { job_id, .. } if job_id == "j1"));
    }
}
