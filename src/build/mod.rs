mod clean;
mod compdb;
mod core;
mod executor;
mod feedback;
mod job;
pub mod namer;
pub mod oracle;
mod report;
mod watcher;

pub use clean::{CleanReport, clean};
pub use compdb::COMPDB_FILE;
pub use core::{BuildOptions, build_project};
pub use executor::{CancelToken, JobOutput, run as run_job};
pub use feedback::FeedbackAnalyzer;
pub use job::{Job, JobKind};
pub use oracle::{Oracle, Staleness};
pub use report::{BuildReport, JobOutcome, JobStatus};
pub use watcher::watch;
