//! Per-state job counts and elapsed-time statistics.

use crate::models::{normalize_state, Record};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("elapsed value '{0}' is not in [days-]hours:minutes:seconds form")]
    MalformedElapsed(String),
}

/// Parse a `[days-]hours:minutes:seconds` duration into hours.
///
/// ```
/// use slurpy::summary::parse_elapsed_hours;
/// assert_eq!(parse_elapsed_hours("1-02:30:00").unwrap(), 26.5);
/// assert_eq!(parse_elapsed_hours("00:45:00").unwrap(), 0.75);
/// ```
pub fn parse_elapsed_hours(elapsed: &str) -> Result<f64, SummaryError> {
    let malformed = || SummaryError::MalformedElapsed(elapsed.to_string());

    let (days, clock) = match elapsed.split_once('-') {
        Some((days, clock)) => (days.parse::<u64>().map_err(|_| malformed())?, clock),
        None => (0, elapsed),
    };

    let parts = clock
        .split(':')
        .map(|part| part.parse::<u64>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>, _>>()?;
    let [hours, minutes, seconds] = parts[..] else {
        return Err(malformed());
    };

    Ok(days as f64 * 24.0 + hours as f64 + minutes as f64 / 60.0 + seconds as f64 / 3600.0)
}

/// Jobs and elapsed hours for one state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSummary {
    pub state: String,
    pub durations: Vec<f64>,
}

impl StateSummary {
    #[must_use]
    pub fn count(&self) -> usize {
        self.durations.len()
    }

    /// `(min, max, median)` in hours, all zero for an empty state.
    #[must_use]
    pub fn stats(&self) -> (f64, f64, f64) {
        if self.durations.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let mut sorted = self.durations.clone();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        (sorted[0], sorted[n - 1], median)
    }
}

/// Classify `records` into `states` (report order) and collect elapsed hours.
///
/// Records whose state is not listed are skipped with a warning. A malformed
/// elapsed value means the output format changed underneath us and is fatal.
pub fn summarize(
    records: &[Record],
    states: &[String],
    state_column: &str,
    elapsed_column: &str,
) -> Result<Vec<StateSummary>, SummaryError> {
    let mut summary: Vec<StateSummary> = states
        .iter()
        .map(|state| StateSummary {
            state: state.clone(),
            durations: Vec::new(),
        })
        .collect();

    for record in records {
        let state = normalize_state(record.get(state_column).unwrap_or_default());
        let Some(entry) = summary.iter_mut().find(|s| s.state == state) else {
            tracing::warn!("state '{}' not in summary states", state);
            continue;
        };
        let elapsed = record.get(elapsed_column).unwrap_or_default();
        entry.durations.push(parse_elapsed_hours(elapsed)?);
    }

    Ok(summary)
}
