//! Error taxonomy for the build engine.
//!
//! - [`ConfigError`] is fatal and surfaces before any job runs.
//! - [`ExecutionError`] belongs to a single job; it fails that job, never the process.
//! - [`StateError`] is recovered locally by the state store.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} not found.\n\n💡 Tip: create one with a [package] name and a [build] modules list.", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("module list is empty")]
    NoModules,

    #[error("module #{0} has an empty name")]
    EmptyModuleName(usize),

    #[error("module '{0}' must be a relative path")]
    AbsoluteModuleName(String),

    #[error("module '{0}' is listed more than once")]
    DuplicateModule(String),

    #[error("{} would be written by more than one job or overwrite a source", .0.display())]
    DuplicateArtifact(PathBuf),

    #[error("package name must not be empty")]
    EmptyBinaryName,

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("output directory {} is not writable: {source}", path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single compile or link job did not produce its output.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to launch '{program}': {source}")]
    ToolchainLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compiler exited with {status}")]
    CompileFailure { status: String, stderr: String },

    #[error("linker exited with {status}")]
    LinkFailure { status: String, stderr: String },

    #[error("exceeded deadline of {0:.2?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("tool succeeded but did not produce {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("cannot read source {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on child process: {0}")]
    Wait(#[source] std::io::Error),
}

impl ExecutionError {
    /// Captured diagnostics of the tool, if it ran far enough to produce any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecutionError::CompileFailure { stderr, .. }
            | ExecutionError::LinkFailure { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read build state {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build state {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("build state {} has schema {found}, expected {expected}", path.display())]
    Schema {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("failed to write build state {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
