use super::feedback::FeedbackAnalyzer;
use super::job::{Job, JobKind};
use super::oracle::Staleness;
use crate::error::ExecutionError;
use crate::ui;
use colored::*;
use std::time::Duration;

#[derive(Debug)]
pub enum JobStatus {
    /// Up to date; nothing ran.
    Fresh,
    Succeeded,
    Failed(ExecutionError),
    /// Not started: blocked by an earlier failure or by cancellation.
    Skipped(&'static str),
    /// Dry run: would have run.
    Pending,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub id: String,
    pub kind: JobKind,
    pub label: String,
    /// Why the job was considered stale, if it was.
    pub reason: Option<Staleness>,
    pub status: JobStatus,
}

impl JobOutcome {
    pub fn new(job: &Job, reason: Option<Staleness>, status: JobStatus) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind,
            label: job.label().to_string(),
            reason,
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, JobStatus::Fresh | JobStatus::Succeeded)
    }

    /// True when a tool was (or would have been) invoked for this job.
    /// An unreadable source fails its job before the compiler is launched.
    pub fn ran(&self) -> bool {
        match &self.status {
            JobStatus::Succeeded | JobStatus::Pending => true,
            JobStatus::Failed(ExecutionError::SourceUnreadable { .. }) => false,
            JobStatus::Failed(_) => true,
            JobStatus::Fresh | JobStatus::Skipped(_) => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub outcomes: Vec<JobOutcome>,
    pub elapsed: Duration,
    pub dry_run: bool,
}

impl BuildReport {
    /// A build succeeds iff every job ended fresh or succeeded.
    pub fn success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(JobOutcome::is_ok)
    }

    pub fn executed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.ran()).count()
    }

    pub fn executed_of(&self, kind: JobKind) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.kind == kind && o.ran())
            .map(|o| o.label.as_str())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn outcome(&self, id: &str) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    /// Every failed job identity goes to stderr, whatever the verbosity.
    pub fn print_failures(&self) {
        for outcome in self.failures() {
            if let JobStatus::Failed(err) = &outcome.status {
                eprintln!(
                    "{} {} job '{}' failed: {}",
                    "x".red(),
                    outcome.kind,
                    outcome.id,
                    err
                );
            }
        }
        for outcome in &self.outcomes {
            if let JobStatus::Skipped(why) = outcome.status {
                eprintln!(
                    "{} {} job '{}' skipped: {}",
                    "!".yellow(),
                    outcome.kind,
                    outcome.id,
                    why
                );
            }
        }
    }

    pub fn print_table(&self) {
        let mut table = ui::Table::new(&["Job", "Kind", "Status", "Reason"]);
        for o in &self.outcomes {
            let status = match &o.status {
                JobStatus::Fresh => "fresh".dimmed().to_string(),
                JobStatus::Succeeded => "built".green().to_string(),
                JobStatus::Failed(_) => "FAILED".red().bold().to_string(),
                JobStatus::Skipped(_) => "skipped".yellow().to_string(),
                JobStatus::Pending => "would run".cyan().to_string(),
            };
            let reason = o.reason.map(|r| r.to_string()).unwrap_or_default();
            table.add_row(vec![o.label.clone(), o.kind.to_string(), status, reason]);
        }
        table.print();
    }

    /// Hints for known toolchain error patterns, one per failed job.
    pub fn print_hints(&self) {
        for outcome in self.failures() {
            if let JobStatus::Failed(err) = &outcome.status
                && let Some(hint) = FeedbackAnalyzer::for_error(err)
            {
                eprintln!("\n{} {} ({})\n{}", "💡".yellow(), "Hint".bold(), outcome.label, hint);
            }
        }
    }
}
