//! Cancellation of the jobs selected by the filter pipeline.
//!
//! The prompt and the per-job `scancel` call are passed in as closures so the
//! orchestration can run without a terminal or a cluster.

use crate::models::{Columns, Header, Record};
use crate::slurm::{describe_code, CommandOutput, SlurmError};

/// A job about to be cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub job_id: String,
    pub name: String,
}

/// Result of one `scancel` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// What the tool printed, or why it could not run
    Failed(String),
}

impl CancelOutcome {
    /// `scancel` is silent on success; any output or exit code means failure.
    pub fn from_result(result: Result<CommandOutput, SlurmError>) -> Self {
        match result {
            Ok(output)
                if output.success
                    && output.stdout.trim().is_empty()
                    && output.stderr.trim().is_empty() =>
            {
                Self::Cancelled
            }
            Ok(output) => {
                let text = [output.stdout.trim(), output.stderr.trim()]
                    .into_iter()
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    Self::Failed(format!(
                        "scancel exited with code {}",
                        describe_code(output.code)
                    ))
                } else {
                    Self::Failed(text)
                }
            }
            Err(err) => Self::Failed(err.to_string()),
        }
    }
}

/// Per-id outcome of a cancellation run, in issue order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelReport {
    pub cancelled: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl CancelReport {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.cancelled.len() + self.failed.len()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Job ids and names of `records`, in record order.
#[must_use]
pub fn candidates(records: &[Record], header: &Header, columns: &Columns) -> Vec<Candidate> {
    let job_id = header.resolve(columns.job_id);
    let name = header.resolve(columns.name);

    records
        .iter()
        .filter_map(|record| {
            let id = record.get(job_id?)?;
            (!id.is_empty()).then(|| Candidate {
                job_id: id.to_string(),
                name: name
                    .and_then(|name| record.get(name))
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Confirm once, then cancel every candidate in order.
///
/// Returns `Ok(None)` when the prompt was declined, in which case `cancel`
/// was never called. A failed cancellation is recorded and the remaining
/// candidates are still processed. Nothing is asked when there is nothing to
/// cancel.
pub fn cancel_jobs<E>(
    candidates: &[Candidate],
    confirm: impl FnOnce(&[Candidate]) -> Result<bool, E>,
    mut cancel: impl FnMut(&Candidate) -> CancelOutcome,
) -> Result<Option<CancelReport>, E> {
    if candidates.is_empty() {
        tracing::info!("no jobs match, nothing to cancel");
        return Ok(Some(CancelReport::default()));
    }
    if !confirm(candidates)? {
        tracing::info!("cancellation of {} jobs declined", candidates.len());
        return Ok(None);
    }

    let mut report = CancelReport::default();
    for candidate in candidates {
        match cancel(candidate) {
            CancelOutcome::Cancelled => report.cancelled.push(candidate.job_id.clone()),
            CancelOutcome::Failed(reason) => {
                tracing::warn!("failed to cancel job '{}': {}", candidate.job_id, reason);
                report.failed.push((candidate.job_id.clone(), reason));
            }
        }
    }
    Ok(Some(report))
}
