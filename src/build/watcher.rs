use super::core::{BuildOptions, build_project};
use crate::config::{BuildConfig, load_config};
use anyhow::Result;
use colored::*;
use notify::{Config, Event, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::Duration;

/// Files whose change should trigger a rebuild: every module source plus the config.
fn watched_files(cfg: &BuildConfig, config_path: &Path) -> BTreeSet<PathBuf> {
    let mut files: BTreeSet<PathBuf> = cfg
        .source_modules
        .iter()
        .map(|m| absolute(&cfg.abs(&m.source)))
        .collect();
    files.insert(absolute(config_path));
    files
}

fn absolute(p: &Path) -> PathBuf {
    std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}

fn is_relevant(event: &Event, files: &BTreeSet<PathBuf>) -> bool {
    event.paths.iter().any(|p| files.contains(&absolute(p)))
}

pub fn watch(config_path: &Path, opts: &BuildOptions) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    println!(
        "{} Watching {} module sources...",
        "👀".cyan(),
        cfg.source_modules.len()
    );

    let (tx, rx) = channel::<notify::Result<Event>>();
    let notify_cfg = Config::default().with_poll_interval(Duration::from_secs(1));
    let mut watcher = notify::RecommendedWatcher::new(tx, notify_cfg)?;

    // Watch directories, not files: editors often replace files on save.
    let mut files = watched_files(&cfg, config_path);
    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    let mut register = |files: &BTreeSet<PathBuf>, watcher: &mut notify::RecommendedWatcher| {
        for dir in files.iter().filter_map(|f| f.parent()) {
            if dirs.insert(dir.to_path_buf())
                && let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive)
            {
                println!("{} Cannot watch {}: {}", "!".yellow(), dir.display(), e);
            }
        }
    };
    register(&files, &mut watcher);

    rebuild(&cfg, opts);

    loop {
        if opts.cancel.is_cancelled() {
            println!("{} Stopped watching", "✓".green());
            break;
        }
        let first = match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        // Debounce
        std::thread::sleep(Duration::from_millis(100));
        let mut relevant = matches!(&first, Ok(ev) if is_relevant(ev, &files));
        while let Ok(next) = rx.try_recv() {
            relevant |= matches!(&next, Ok(ev) if is_relevant(ev, &files));
        }
        if !relevant {
            continue;
        }

        match load_config(config_path) {
            Ok(new_cfg) => {
                cfg = new_cfg;
                files = watched_files(&cfg, config_path);
                register(&files, &mut watcher);
            }
            Err(e) => {
                println!("{} {} (keeping previous config)", "x".red(), e);
            }
        }
        rebuild(&cfg, opts);
    }
    Ok(())
}

fn rebuild(cfg: &BuildConfig, opts: &BuildOptions) {
    print!("\x1B[2J\x1B[1;1H");
    println!("{} Rebuilding...", "🔄".yellow());
    match build_project(cfg, opts) {
        Ok(report) => {
            report.print_failures();
            report.print_hints();
        }
        Err(e) => println!("{} Error: {:#}", "x".red(), e),
    }
}
