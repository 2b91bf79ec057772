//! Staleness decisions.
//!
//! A compile job's input fingerprint is the SHA-256 of its source file. A link
//! job's input fingerprint covers the ordered artifact list, where each
//! artifact contributes the fingerprint of the compile that produced it. Both
//! kinds carry a command signature, the SHA-256 of the exact argv.

use super::job::{Job, JobKind};
use crate::error::ExecutionError;
use crate::state::{JobRecord, StateStore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub input: String,
    pub command: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    NoRecord,
    PreviousFailure,
    CommandChanged,
    InputChanged,
    OutputMissing,
}

impl Staleness {
    pub fn is_stale(self) -> bool {
        self != Staleness::Fresh
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Staleness::Fresh => "up to date",
            Staleness::NoRecord => "never built",
            Staleness::PreviousFailure => "failed last time",
            Staleness::CommandChanged => "command changed",
            Staleness::InputChanged => "inputs changed",
            Staleness::OutputMissing => "output missing",
        };
        f.write_str(s)
    }
}

pub fn file_fingerprint(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn command_signature(argv: &[String]) -> String {
    let mut hasher = Sha256::new();
    for arg in argv {
        hasher.update(arg.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// What a successful compile record says about the artifact it produced.
/// `None` for missing or failed records.
pub fn artifact_fingerprint(record: Option<&JobRecord>) -> Option<String> {
    let record = record.filter(|r| r.success)?;
    let mut hasher = Sha256::new();
    hasher.update(record.input_fingerprint.as_bytes());
    hasher.update([0u8]);
    hasher.update(record.command_signature.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

/// Pure verdict given the prior record and the current fingerprint.
pub fn judge(record: Option<&JobRecord>, current: &Fingerprint, output_exists: bool) -> Staleness {
    let Some(record) = record else {
        return Staleness::NoRecord;
    };
    if !record.success {
        Staleness::PreviousFailure
    } else if record.command_signature != current.command {
        Staleness::CommandChanged
    } else if record.input_fingerprint != current.input {
        Staleness::InputChanged
    } else if !output_exists {
        Staleness::OutputMissing
    } else {
        Staleness::Fresh
    }
}

pub struct Oracle<'a> {
    root: &'a Path,
    store: &'a StateStore,
}

impl<'a> Oracle<'a> {
    pub fn new(root: &'a Path, store: &'a StateStore) -> Self {
        Self { root, store }
    }

    /// Fingerprint a job's inputs as they are right now. For a link job this
    /// reads the store, so call it only after every compile has been recorded.
    pub fn fingerprint(&self, job: &Job) -> Result<Fingerprint, ExecutionError> {
        let input = match job.kind {
            JobKind::Compile => {
                let source = &job.inputs[0];
                file_fingerprint(&self.root.join(source)).map_err(|source_err| {
                    ExecutionError::SourceUnreadable {
                        path: source.clone(),
                        source: source_err,
                    }
                })?
            }
            JobKind::Link => {
                let mut hasher = Sha256::new();
                for artifact in &job.inputs {
                    let id = artifact.to_string_lossy();
                    let fp = artifact_fingerprint(self.store.get(&id).as_ref())
                        .unwrap_or_else(|| "-".to_string());
                    hasher.update(id.as_bytes());
                    hasher.update([0u8]);
                    hasher.update(fp.as_bytes());
                    hasher.update([0u8]);
                }
                format!("{:x}", hasher.finalize())
            }
        };

        Ok(Fingerprint {
            input,
            command: command_signature(&job.argv),
        })
    }

    pub fn assess(&self, job: &Job) -> Result<(Staleness, Fingerprint), ExecutionError> {
        let fp = self.fingerprint(job)?;
        let exists = self.root.join(&job.output).exists();
        let verdict = judge(self.store.get(&job.id).as_ref(), &fp, exists);
        Ok((verdict, fp))
    }

    /// A job whose inputs cannot even be fingerprinted is stale.
    pub fn is_stale(&self, job: &Job) -> bool {
        self.assess(job)
            .map(|(verdict, _)| verdict.is_stale())
            .unwrap_or(true)
    }
}
