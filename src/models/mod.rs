//! Data models: parsed records, filter specifications, job states and
//! configuration.

mod config;
mod filter;
mod record;
mod state;

pub use config::{BehaviorConfig, Config, DisplayConfig, FormatConfig, SystemConfig};
pub use filter::{
    parse_record_time, parse_threshold, start_threshold, Filter, FilterError, FilterSpec,
    JobIdFilter, SortKey,
};
pub use record::{Columns, Header, Record, Table};
pub use state::{is_known_state, normalize_state, JobState, KNOWN_JOB_STATES};
