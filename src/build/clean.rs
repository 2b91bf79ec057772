//! Build artifact cleanup.
//!
//! `fab clean` removes every object file, the linked binary, the generated
//! compilation database, and every build record entry. It never asks the
//! oracle: fresh outputs go too. Outputs that never existed are not an error.
//!
//! Object files recorded by earlier runs for modules that have since left the
//! module list are removed as well, as long as their recorded path stays
//! inside the project.

use super::compdb::COMPDB_FILE;
use super::job::Job;
use super::namer;
use crate::config::BuildConfig;
use crate::state::StateStore;
use anyhow::{Context, Result};
use colored::*;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Default)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    /// Modules no longer listed whose leftover object files were removed.
    pub orphaned: Vec<String>,
    pub records_cleared: usize,
}

// Recorded ids come from a file on disk; only follow ones that stay under the root.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

pub fn clean(cfg: &BuildConfig) -> Result<CleanReport> {
    let store = StateStore::open(&cfg.abs(&cfg.state_dir));

    let listed: BTreeSet<PathBuf> = cfg
        .source_modules
        .iter()
        .map(|m| Job::compile(cfg, m).output)
        .collect();
    let mut targets = listed.clone();
    targets.insert(cfg.output_binary.clone());
    targets.insert(PathBuf::from(COMPDB_FILE));
    targets.extend(
        store
            .snapshot()
            .jobs
            .keys()
            .map(PathBuf::from)
            .filter(|p| is_contained(p)),
    );

    let mut report = CleanReport::default();
    let mut failures = Vec::new();
    for rel in targets {
        let path = cfg.abs(&rel);
        match fs::remove_file(&path) {
            Ok(()) => {
                if !listed.contains(&rel)
                    && rel.starts_with(&cfg.obj_dir)
                    && let Some(module) = namer::module_for(&rel)
                {
                    println!("   {} leftover object of '{}'", "-".dimmed(), module);
                    report.orphaned.push(module);
                }
                report.removed.push(rel);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => failures.push(format!("{}: {}", path.display(), e)),
        }
    }

    report.records_cleared = store
        .clear()
        .context("Failed to clear build state")?
        .len();

    if !failures.is_empty() {
        anyhow::bail!("Failed to remove:\n  {}", failures.join("\n  "));
    }

    if report.removed.is_empty() && report.records_cleared == 0 {
        println!("{} Nothing to clean", "!".yellow());
    } else {
        println!(
            "{} Clean complete ({} file{} removed)",
            "✓".green(),
            report.removed.len(),
            if report.removed.len() == 1 { "" } else { "s" }
        );
    }
    Ok(report)
}
