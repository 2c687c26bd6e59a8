//! Display-ordered job history.

use std::collections::HashSet;

use crate::job::JobRecord;

/// Fold the active job into the history list.
///
/// The active job (the freshest known record for its id) comes first;
/// the rest keeps the collaborator's order with any record sharing the
/// active id dropped. Duplicate ids further down keep their first
/// occurrence, so the output never repeats a `job_id`.
pub fn merge(history: &[JobRecord], active: Option<&JobRecord>) -> Vec<JobRecord> {
    let mut seen = HashSet::with_capacity(history.len() + 1);
    let mut merged = Vec::with_capacity(history.len() + 1);

    if let Some(job) = active {
        seen.insert(job.job_id.as_str());
        merged.push(job.clone());
    }

    for record in history {
        if seen.insert(record.job_id.as_str()) {
            merged.push(record.clone());
        }
    }

    merged
}
