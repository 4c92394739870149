//! slurpy - filter, sort and tabulate Slurm accounting and queue output
//!
//! This library exposes the parsing and record pipeline behind the `slurpy`
//! binary so it can be tested and benchmarked without a cluster.

pub mod cancel;
pub mod display;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod slurm;
pub mod summary;
pub mod utils;
pub mod watch;
