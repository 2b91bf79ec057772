//! Persisted build record (`.fab/state.json`).
//!
//! The record is read fully when a build starts and rewritten after every
//! job that finishes. Writes go to a temp file in the state directory and are
//! renamed over the old file, so a crash leaves either the old or the new
//! record, never a torn one. A job whose completion was not yet persisted is
//! simply rebuilt next time.

use crate::error::StateError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "state.json";
pub const SCHEMA: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub input_fingerprint: String,
    pub command_signature: String,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub jobs: BTreeMap<String, JobRecord>,
}

impl BuildRecord {
    pub fn get(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    pub fn insert(&mut self, id: String, record: JobRecord) {
        self.jobs.insert(id, record);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[derive(Serialize)]
struct OnDisk<'a> {
    schema: u32,
    jobs: &'a BTreeMap<String, JobRecord>,
}

#[derive(Deserialize)]
struct RawOnDisk {
    schema: u32,
    #[serde(default)]
    jobs: BTreeMap<String, serde_json::Value>,
}

pub struct StateStore {
    path: PathBuf,
    record: Mutex<BuildRecord>,
    warnings: Vec<StateError>,
}

impl StateStore {
    /// Open the store in `state_dir`, recovering from any read problem with an
    /// empty (or partial) record. Recovered problems are kept in [`warnings`](Self::warnings).
    pub fn open(state_dir: &Path) -> Self {
        let path = state_dir.join(STATE_FILE);
        let mut warnings = Vec::new();
        let record = match Self::load(&path) {
            Ok((record, dropped)) => {
                warnings.extend(dropped);
                record
            }
            Err(e) => {
                warnings.push(e);
                BuildRecord::default()
            }
        };

        Self {
            path,
            record: Mutex::new(record),
            warnings,
        }
    }

    /// Read the record at `path`. Entries that fail to parse are dropped one by
    /// one and returned as errors; the rest of the record survives.
    pub fn load(path: &Path) -> Result<(BuildRecord, Vec<StateError>), StateError> {
        if !path.exists() {
            return Ok((BuildRecord::default(), Vec::new()));
        }

        let content = fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawOnDisk =
            serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        if raw.schema != SCHEMA {
            return Err(StateError::Schema {
                path: path.to_path_buf(),
                found: raw.schema,
                expected: SCHEMA,
            });
        }

        let mut record = BuildRecord::default();
        let mut dropped = Vec::new();
        for (id, value) in raw.jobs {
            match serde_json::from_value::<JobRecord>(value) {
                Ok(entry) => record.insert(id, entry),
                Err(source) => dropped.push(StateError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }),
            }
        }
        Ok((record, dropped))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn warnings(&self) -> &[StateError] {
        &self.warnings
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.record.lock().get(id).cloned()
    }

    pub fn snapshot(&self) -> BuildRecord {
        self.record.lock().clone()
    }

    /// Set `id`'s entry and persist. The lock is held across the write so
    /// concurrent jobs never interleave their saves.
    pub fn record(&self, id: &str, entry: JobRecord) -> Result<(), StateError> {
        let mut guard = self.record.lock();
        guard.insert(id.to_string(), entry);
        self.write(&guard)
    }

    /// Mark `id` as failed, keeping whatever fingerprints it had. A job that
    /// never had an entry gets one with empty fingerprints.
    pub fn mark_failed(&self, id: &str) -> Result<(), StateError> {
        let mut guard = self.record.lock();
        let entry = guard.jobs.entry(id.to_string()).or_insert(JobRecord {
            input_fingerprint: String::new(),
            command_signature: String::new(),
            success: false,
        });
        entry.success = false;
        self.write(&guard)
    }

    /// Drop every entry and persist the empty record.
    pub fn clear(&self) -> Result<BuildRecord, StateError> {
        let mut guard = self.record.lock();
        let old = std::mem::take(&mut *guard);
        self.write(&guard)?;
        Ok(old)
    }

    /// Persist the in-memory record as is. After a recovered load this
    /// replaces the damaged file so the same warning is not raised again.
    pub fn save(&self) -> Result<(), StateError> {
        let guard = self.record.lock();
        self.write(&guard)
    }

    fn write(&self, record: &BuildRecord) -> Result<(), StateError> {
        let write_err = |source| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_err)?;

        let body = serde_json::to_vec_pretty(&OnDisk {
            schema: SCHEMA,
            jobs: &record.jobs,
        })
        .map_err(|e| write_err(std::io::Error::other(e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&body).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
