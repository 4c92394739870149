//! Job state names as reported by `sacct` and `squeue`.
//!
//! `sacct` decorates some states with extra text (most notably
//! `CANCELLED by 56895`), so every comparison against a state goes through
//! [`normalize_state`] first.

/// Every job state and job flag Slurm can report.
///
/// Flags are listed before base states. A state constraint outside this list
/// is still honoured, it only produces a warning.
///
/// Reference: https://slurm.schedmd.com/job_state_codes.html
pub const KNOWN_JOB_STATES: &[&str] = &[
    // Job flags
    "LAUNCH_FAILED",
    "RECONFIG_FAIL",
    "COMPLETING",
    "CONFIGURING",
    "POWER_UP_NODE",
    "STAGE_OUT",
    "REQUEUED",
    "REQUEUE_FED",
    "REQUEUE_HOLD",
    "SPECIAL_EXIT",
    "RESV_DEL_HOLD",
    "EXPEDITING",
    "RESIZING",
    "SIGNALING",
    "STOPPED",
    "UPDATE_DB",
    "REVOKED",
    // Base states
    "RUNNING",
    "PENDING",
    "SUSPENDED",
    "COMPLETED",
    "CANCELLED",
    "FAILED",
    "TIMEOUT",
    "PREEMPTED",
    "NODE_FAIL",
    "BOOT_FAIL",
    "DEADLINE",
    "OUT_OF_MEMORY",
];

/// Strip the actor suffix `sacct` appends to cancelled jobs.
///
/// `"CANCELLED by 56895"` becomes `"CANCELLED"`. Any other value is returned
/// unchanged.
#[must_use]
pub fn normalize_state(state: &str) -> &str {
    let is_cancelled = state
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("cancelled"));
    if is_cancelled {
        state.split(" by ").next().unwrap_or(state)
    } else {
        state
    }
}

/// Whether `state` is one of [`KNOWN_JOB_STATES`].
#[must_use]
pub fn is_known_state(state: &str) -> bool {
    KNOWN_JOB_STATES.contains(&state)
}

/// Coarse classification of a job state, used to colour the summary report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Unknown,
    Running,
    Pending,
    Suspended,
    Completed,
    Cancelled,
    Failed,
    Timeout,
}

impl JobState {
    /// Classify a (possibly decorated) state string.
    ///
    /// Handles both full names (e.g., "RUNNING") and the short codes `squeue`
    /// uses with `StateCompact` (e.g., "R").
    #[must_use]
    pub fn from_state_string(state: &str) -> Self {
        match state.split_whitespace().next() {
            Some("RUNNING") | Some("R") => Self::Running,
            Some("PENDING") | Some("PD") => Self::Pending,
            Some("SUSPENDED") | Some("S") => Self::Suspended,
            Some("COMPLETED") | Some("CD") => Self::Completed,
            Some("CANCELLED") | Some("CA") => Self::Cancelled,
            Some("FAILED") | Some("F") | Some("NODE_FAIL") | Some("NF") | Some("BOOT_FAIL")
            | Some("OUT_OF_MEMORY") | Some("OOM") => Self::Failed,
            Some("TIMEOUT") | Some("TO") | Some("DEADLINE") | Some("DL") => Self::Timeout,
            _ => Self::Unknown,
        }
    }
}
