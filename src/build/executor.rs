//! Subprocess execution for compile and link jobs.
//!
//! The executor never retries and never records anything: it runs the argv,
//! reports what happened, and on failure removes whatever partial output the
//! tool left behind.

use super::job::{Job, JobKind};
use crate::error::ExecutionError;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared cancellation flag. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct JobOutput {
    /// Diagnostics the tool printed even though it succeeded (warnings).
    pub stderr: String,
    pub elapsed: Duration,
}

pub fn run(
    job: &Job,
    root: &Path,
    deadline: Option<Duration>,
    cancel: &CancelToken,
) -> Result<JobOutput, ExecutionError> {
    let output_path = root.join(&job.output);
    let result = execute(job, root, deadline, cancel);

    match result {
        Ok(out) if output_path.exists() => Ok(out),
        Ok(_) => Err(ExecutionError::MissingOutput(job.output.clone())),
        Err(e) => {
            discard(&output_path);
            Err(e)
        }
    }
}

fn execute(
    job: &Job,
    root: &Path,
    deadline: Option<Duration>,
    cancel: &CancelToken,
) -> Result<JobOutput, ExecutionError> {
    if cancel.is_cancelled() {
        return Err(ExecutionError::Cancelled);
    }
    // A leftover from an earlier run must not pass for this run's output.
    discard(&root.join(&job.output));

    let start = Instant::now();
    let mut child = Command::new(job.program())
        .args(&job.argv[1..])
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutionError::ToolchainLaunch {
            program: job.program().to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if cancel.is_cancelled() {
                    terminate(&mut child);
                    return Err(ExecutionError::Cancelled);
                }
                if let Some(limit) = deadline
                    && start.elapsed() >= limit
                {
                    terminate(&mut child);
                    return Err(ExecutionError::TimedOut(limit));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                terminate(&mut child);
                return Err(ExecutionError::Wait(e));
            }
        }
    };

    // Compilers print diagnostics on stderr; stdout is drained only so the
    // child never blocks on a full pipe.
    let _ = collect(stdout);
    let stderr = collect(stderr);

    if status.success() {
        return Ok(JobOutput {
            stderr,
            elapsed: start.elapsed(),
        });
    }

    let status = status.to_string();
    Err(match job.kind {
        JobKind::Compile => ExecutionError::CompileFailure { status, stderr },
        JobKind::Link => ExecutionError::LinkFailure { status, stderr },
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

// Reader threads are left detached here: a grandchild may still hold the pipes.
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn discard(path: &Path) {
    let _ = fs::remove_file(path);
}
