use super::compdb;
use super::executor::{self, CancelToken};
use super::job::Job;
use super::oracle::{Fingerprint, Oracle, Staleness};
use super::report::{BuildReport, JobOutcome, JobStatus};
use crate::config::BuildConfig;
use crate::error::{ConfigError, ExecutionError};
use crate::state::{JobRecord, StateStore};
use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Overrides `jobs` from the config.
    pub jobs: Option<usize>,
    /// Overrides `timeout_secs` from the config.
    pub timeout: Option<Duration>,
    pub dry_run: bool,
    pub verbose: bool,
    /// Draw a progress bar (only when attached to a terminal).
    pub progress: bool,
    pub cancel: CancelToken,
}

// --- Helper: Print without tearing the progress bar ---
fn say(pb: &ProgressBar, msg: String) {
    if pb.is_hidden() {
        eprintln!("{}", msg);
    } else {
        pb.println(msg);
    }
}

// --- Helper: Make sure an output directory exists and accepts files ---
fn ensure_writable(dir: &Path) -> Result<(), ConfigError> {
    let unwritable = |source| ConfigError::Unwritable {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(unwritable)?;
    tempfile::NamedTempFile::new_in(dir).map_err(unwritable)?;
    Ok(())
}

fn prepare_dirs(cfg: &BuildConfig) -> Result<(), ConfigError> {
    ensure_writable(&cfg.abs(&cfg.obj_dir))?;
    if let Some(parent) = cfg.abs(&cfg.output_binary).parent() {
        ensure_writable(parent)?;
    }
    ensure_writable(&cfg.abs(&cfg.state_dir))
}

fn record_success(store: &StateStore, job: &Job, fp: &Fingerprint, pb: &ProgressBar) {
    let entry = JobRecord {
        input_fingerprint: fp.input.clone(),
        command_signature: fp.command.clone(),
        success: true,
    };
    if let Err(e) = store.record(&job.id, entry) {
        say(pb, format!("{} {} (will rebuild next time)", "!".yellow(), e));
    }
}

fn record_failure(store: &StateStore, job: &Job, err: &ExecutionError, pb: &ProgressBar) {
    let mut msg = format!("{} Error in {} {}: {}", "x".red(), job.kind, job.label().bold(), err);
    if let Some(stderr) = err.stderr()
        && !stderr.trim().is_empty()
    {
        msg.push('\n');
        msg.push_str(stderr.trim_end());
    }
    say(pb, msg);

    if let Err(e) = store.mark_failed(&job.id) {
        say(pb, format!("{} {}", "!".yellow(), e));
    }
}

/// What every job execution in one build run shares.
struct JobContext<'a> {
    cfg: &'a BuildConfig,
    store: &'a StateStore,
    opts: &'a BuildOptions,
    timeout: Option<Duration>,
}

impl JobContext<'_> {
    /// Run one stale job and record its outcome.
    fn execute(
        &self,
        job: &Job,
        fp: &Fingerprint,
        reason: Staleness,
        pb: &ProgressBar,
    ) -> JobOutcome {
        if self.opts.cancel.is_cancelled() {
            return JobOutcome::new(job, Some(reason), JobStatus::Skipped("cancelled"));
        }

        pb.set_message(format!("{} {}", job.kind, job.label()));
        if self.opts.verbose {
            say(pb, format!("   {} {}", "$".dimmed(), job.command_line()));
        }

        let status = match executor::run(job, &self.cfg.root, self.timeout, &self.opts.cancel) {
            Ok(out) => {
                if !out.stderr.trim().is_empty() {
                    say(
                        pb,
                        format!(
                            "{} Warning in {}:\n{}",
                            "!".yellow(),
                            job.label(),
                            out.stderr.trim_end()
                        ),
                    );
                }
                if self.opts.verbose {
                    say(
                        pb,
                        format!("   {} {} in {:.2?}", "✓".green(), job.label(), out.elapsed),
                    );
                }
                record_success(self.store, job, fp, pb);
                JobStatus::Succeeded
            }
            Err(e) => {
                record_failure(self.store, job, &e, pb);
                JobStatus::Failed(e)
            }
        };
        JobOutcome::new(job, Some(reason), status)
    }
}

// --- CORE: Build Project ---
pub fn build_project(cfg: &BuildConfig, opts: &BuildOptions) -> Result<BuildReport> {
    let start_time = Instant::now();

    // 1. Init: validate overrides and output directories before any job runs
    let jobs = opts.jobs.unwrap_or(cfg.jobs);
    if jobs == 0 {
        return Err(ConfigError::ZeroWorkers.into());
    }
    let timeout = opts.timeout.or(cfg.timeout);
    if !opts.dry_run {
        prepare_dirs(cfg)?;
    }

    let store = StateStore::open(&cfg.abs(&cfg.state_dir));
    for warning in store.warnings() {
        println!(
            "{} {} (affected jobs will be rebuilt)",
            "!".yellow(),
            warning
        );
    }
    if !store.warnings().is_empty()
        && !opts.dry_run
        && let Err(e) = store.save()
    {
        println!("{} {}", "!".yellow(), e);
    }

    let compile_jobs: Vec<Job> = cfg
        .source_modules
        .iter()
        .map(|m| Job::compile(cfg, m))
        .collect();
    let link_job = Job::link(cfg);

    // 2. Partition compile jobs into fresh / stale
    let oracle = Oracle::new(&cfg.root, &store);
    let mut outcomes: Vec<Option<JobOutcome>> = Vec::with_capacity(compile_jobs.len());
    let mut stale: Vec<(usize, Staleness, Fingerprint)> = Vec::new();

    for (idx, job) in compile_jobs.iter().enumerate() {
        match oracle.assess(job) {
            Ok((Staleness::Fresh, _)) => {
                outcomes.push(Some(JobOutcome::new(job, None, JobStatus::Fresh)));
            }
            Ok((reason, fp)) => {
                if opts.verbose {
                    println!("   {} {}: {}", "~".cyan(), job.label(), reason);
                }
                outcomes.push(None);
                stale.push((idx, reason, fp));
            }
            Err(e) => {
                if opts.dry_run {
                    println!("{} {}: {}", "x".red(), job.label(), e);
                } else {
                    record_failure(&store, job, &e, &ProgressBar::hidden());
                }
                outcomes.push(Some(JobOutcome::new(job, None, JobStatus::Failed(e))));
            }
        }
    }

    // 3. Dry run: report what would happen and stop
    if opts.dry_run {
        for (idx, reason, _) in &stale {
            outcomes[*idx] = Some(JobOutcome::new(
                &compile_jobs[*idx],
                Some(*reason),
                JobStatus::Pending,
            ));
        }
        let link_outcome = if stale.is_empty() {
            match oracle.assess(&link_job) {
                Ok((Staleness::Fresh, _)) => JobOutcome::new(&link_job, None, JobStatus::Fresh),
                Ok((reason, _)) => JobOutcome::new(&link_job, Some(reason), JobStatus::Pending),
                Err(e) => JobOutcome::new(&link_job, None, JobStatus::Failed(e)),
            }
        } else {
            JobOutcome::new(
                &link_job,
                Some(Staleness::InputChanged),
                JobStatus::Pending,
            )
        };
        let mut all: Vec<JobOutcome> = outcomes.into_iter().flatten().collect();
        all.push(link_outcome);
        return Ok(BuildReport {
            outcomes: all,
            elapsed: start_time.elapsed(),
            dry_run: true,
        });
    }

    if let Err(e) = compdb::write(&cfg.root, &compile_jobs) {
        println!("{} {:#}", "!".yellow(), e);
    }

    // 4. Compiling: stale jobs in parallel, each recorded as soon as it finishes
    let pb = if opts.progress && !stale.is_empty() {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let pb = ProgressBar::new(stale.len() as u64);
        pb.set_style(style);
        pb
    } else {
        ProgressBar::hidden()
    };

    let ctx = JobContext {
        cfg,
        store: &store,
        opts,
        timeout,
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to start compile worker pool")?;

    // The collect is the barrier: every compile has finished before it returns.
    let compiled: Vec<(usize, JobOutcome)> = pool.install(|| {
        stale
            .par_iter()
            .map(|(idx, reason, fp)| {
                let job = &compile_jobs[*idx];
                let outcome = ctx.execute(job, fp, *reason, &pb);
                pb.inc(1);
                (*idx, outcome)
            })
            .collect()
    });
    pb.finish_and_clear();

    for (idx, outcome) in compiled {
        outcomes[idx] = Some(outcome);
    }
    let mut outcomes: Vec<JobOutcome> = outcomes.into_iter().flatten().collect();

    // 5. Linking: only when every artifact is good
    let blocked = outcomes.iter().any(|o| !o.is_ok());
    let link_outcome = if blocked {
        JobOutcome::new(
            &link_job,
            None,
            JobStatus::Skipped("a compile job did not succeed"),
        )
    } else if opts.cancel.is_cancelled() {
        JobOutcome::new(&link_job, None, JobStatus::Skipped("cancelled"))
    } else {
        match oracle.assess(&link_job) {
            Ok((Staleness::Fresh, _)) => JobOutcome::new(&link_job, None, JobStatus::Fresh),
            Ok((reason, fp)) => {
                if opts.verbose {
                    println!("   {} {}: {}", "~".cyan(), link_job.label(), reason);
                }
                println!("   {} Linking {}...", "🔗".cyan(), link_job.label());
                let quiet = ProgressBar::hidden();
                ctx.execute(&link_job, &fp, reason, &quiet)
            }
            Err(e) => JobOutcome::new(&link_job, None, JobStatus::Failed(e)),
        }
    };
    outcomes.push(link_outcome);

    let report = BuildReport {
        outcomes,
        elapsed: start_time.elapsed(),
        dry_run: false,
    };

    // 6. Done
    if !report.success() {
        println!("{} Build failed", "x".red());
    } else if report.executed() == 0 {
        println!("{} Up to date", "⚡".green());
    } else {
        println!(
            "{} Build finished in {:.2?} ({} job{} run)",
            "✓".green(),
            report.elapsed,
            report.executed(),
            if report.executed() == 1 { "" } else { "s" }
        );
    }

    Ok(report)
}
