//! `compile_commands.json` for clangd and other editor tooling.

use super::job::{Job, JobKind};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const COMPDB_FILE: &str = "compile_commands.json";

#[derive(Serialize)]
struct Entry<'a> {
    directory: String,
    arguments: &'a [String],
    file: String,
    output: String,
}

pub fn write(root: &Path, jobs: &[Job]) -> Result<()> {
    let directory = fs::canonicalize(root)
        .unwrap_or_else(|_| root.to_path_buf())
        .to_string_lossy()
        .to_string();

    let entries: Vec<Entry> = jobs
        .iter()
        .filter(|j| j.kind == JobKind::Compile)
        .map(|j| Entry {
            directory: directory.clone(),
            arguments: &j.argv,
            file: j.inputs[0].to_string_lossy().to_string(),
            output: j.output.to_string_lossy().to_string(),
        })
        .collect();

    let json = serde_json::to_string_pretty(&entries)?;
    fs::write(root.join(COMPDB_FILE), json).context("Failed to write compile_commands.json")?;
    Ok(())
}
