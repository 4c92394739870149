//! Filter and sort specifications.
//!
//! A [`FilterSpec`] holds the loosely-typed user input. [`FilterSpec::build`]
//! validates it once into a list of [`Filter`] variants that the pipeline
//! applies uniformly.

use chrono::{NaiveDate, NaiveDateTime};
use std::str::FromStr;
use thiserror::Error;

/// Layouts accepted for a start-time threshold, tried in order.
const THRESHOLD_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_LAYOUT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("could not parse job id specification '{spec}': {reason}")]
    InvalidJobIds { spec: String, reason: String },
}

/// Job-id constraint: an explicit set of ids or a closed numeric range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobIdFilter {
    Set(Vec<String>),
    Range { lo: u64, hi: u64 },
}

impl JobIdFilter {
    /// Parse the job-id arguments as given on the command line.
    ///
    /// The arguments are joined with spaces first, so `-j 1 2,3` and
    /// `-j "1,2 3"` are equivalent. A single `:` selects range mode.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, FilterError> {
        let parts: Vec<&str> = args.iter().map(|arg| arg.as_ref()).collect();
        parts.join(" ").parse()
    }
}

impl FromStr for JobIdFilter {
    type Err = FilterError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| FilterError::InvalidJobIds {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [lo, hi] => {
                let lo: u64 = lo
                    .parse()
                    .map_err(|_| invalid("range bounds must be integers"))?;
                let hi: u64 = hi
                    .parse()
                    .map_err(|_| invalid("range bounds must be integers"))?;
                if lo > hi {
                    return Err(invalid("lower bound is greater than upper bound"));
                }
                Ok(Self::Range { lo, hi })
            }
            [list] => {
                let ids: Vec<String> = list
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect();
                if ids.is_empty() {
                    return Err(invalid("no job ids given"));
                }
                Ok(Self::Set(ids))
            }
            _ => Err(invalid("expected a list of ids or a single 'LO:HI' range")),
        }
    }
}

/// One validated filter stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    State(String),
    Partition(String),
    Name(String),
    JobId(JobIdFilter),
    StartAfter(NaiveDateTime),
}

impl Filter {
    /// Short label used in diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::State(_) => "State",
            Self::Partition(_) => "Partition",
            Self::Name(_) => "JobName",
            Self::JobId(_) => "JobID",
            Self::StartAfter(_) => "Start",
        }
    }
}

/// User-supplied filter constraints, each independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub state: Option<String>,
    pub partition: Option<String>,
    pub name: Option<String>,
    pub jobid: Option<JobIdFilter>,
    pub start: Option<String>,
}

impl FilterSpec {
    /// Build the ordered filter list.
    ///
    /// An unparseable start threshold is logged and left out rather than
    /// failing the whole command.
    #[must_use]
    pub fn build(&self) -> Vec<Filter> {
        let mut filters = Vec::new();

        if let Some(state) = &self.state {
            if !super::state::is_known_state(state) {
                tracing::warn!("state '{}' is not a known Slurm job state", state);
            }
            filters.push(Filter::State(state.clone()));
        }
        if let Some(partition) = &self.partition {
            filters.push(Filter::Partition(partition.clone()));
        }
        if let Some(name) = &self.name {
            filters.push(Filter::Name(name.clone()));
        }
        if let Some(jobid) = &self.jobid {
            filters.push(Filter::JobId(jobid.clone()));
        }
        if let Some(start) = &self.start {
            match parse_threshold(start) {
                Some(threshold) => {
                    tracing::debug!("`start` = '{}' ==> '{}'", start, threshold);
                    filters.push(Filter::StartAfter(threshold));
                }
                None => {
                    tracing::error!(
                        "could not parse start time '{}', not filtering by start",
                        start
                    );
                }
            }
        }

        filters
    }
}

/// The validated start threshold among `filters`, if any.
///
/// An unparseable `--start` never produces a [`Filter::StartAfter`], so this
/// is `None` for it.
#[must_use]
pub fn start_threshold(filters: &[Filter]) -> Option<NaiveDateTime> {
    filters.iter().find_map(|filter| match filter {
        Filter::StartAfter(threshold) => Some(*threshold),
        _ => None,
    })
}

/// Parse a start-time threshold using the first layout that matches.
///
/// A bare date means midnight of that day.
#[must_use]
pub fn parse_threshold(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    THRESHOLD_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_LAYOUT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Parse a record's timestamp field (`date space time`, or `date T time`
/// when reformatting is switched off).
#[must_use]
pub fn parse_record_time(value: &str) -> Option<NaiveDateTime> {
    THRESHOLD_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
}

/// Column to sort by, descending when written with a leading `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl FromStr for SortKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.strip_prefix('-') {
            Some(column) => Self {
                column: column.to_string(),
                descending: true,
            },
            None => Self {
                column: s.to_string(),
                descending: false,
            },
        })
    }
}
