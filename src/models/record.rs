//! Parsed rows of `sacct` / `squeue` output.

use crate::utils::find_column;

/// Ordered column names of one invocation's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Derive the header from the external tool's header line.
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        Self::new(line.split_whitespace().map(str::to_string).collect())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Resolve a user-supplied column name to the header's spelling.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        find_column(self.columns.iter(), name).map(String::as_str)
    }
}

/// One job (or job step) keyed by column name, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    #[must_use]
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Value of `column`, matched exactly.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Header plus records from a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Header,
    pub records: Vec<Record>,
}

/// Which header column carries each field the pipeline needs.
///
/// `sacct` and `squeue` label the same concepts differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    pub job_id: &'static str,
    pub name: &'static str,
    pub state: &'static str,
    pub partition: &'static str,
    pub start: &'static str,
    pub elapsed: &'static str,
}

impl Columns {
    #[must_use]
    pub const fn sacct() -> Self {
        Self {
            job_id: "JobID",
            name: "JobName",
            state: "State",
            partition: "Partition",
            start: "Start",
            elapsed: "Elapsed",
        }
    }

    #[must_use]
    pub const fn squeue() -> Self {
        Self {
            job_id: "JOBID",
            name: "NAME",
            state: "STATE",
            partition: "PARTITION",
            start: "START_TIME",
            elapsed: "TIME",
        }
    }
}
