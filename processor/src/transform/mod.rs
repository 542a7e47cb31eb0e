//! Transformation module.
//!
//! - Selection: pick one charge out of a pipe-separated list
//! - Pipeline: the row loop with checkpointing
//! - Jobs: display crime and plain-English charge

pub mod jobs;
pub mod pipeline;
pub mod selection;

pub use jobs::{reword, DisplayCrimeJob, PlainChargeJob};
pub use pipeline::{run_job, Job, Row, RowOutcome, RunOptions, RunSummary};
pub use selection::{resolve_answer, ChargeSelector};
