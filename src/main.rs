//! # fabrik CLI Entry Point
//!
//! This is the main executable for the `fab` command-line tool.
//! It parses CLI arguments using clap and routes commands to the build engine.
//!
//! ## Commands
//!
//! - `build` - compile stale modules in parallel, then relink if needed
//! - `clean` - remove every artifact, the binary and the build record
//! - `watch` - rebuild whenever a module source or `fab.toml` changes
//! - `completion` - print shell completions

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use fabrik::build::{self, BuildOptions, CancelToken};
use fabrik::config::{self, CONFIG_FILE};

#[derive(Parser)]
#[command(name = "fab")]
#[command(about = "Incremental build driver for native toolchains", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile stale modules and relink the binary
    Build {
        /// Number of parallel compile jobs
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Per-job deadline in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Show what would be executed without running
        #[arg(long)]
        dry_run: bool,
        /// Show commands and staleness decisions
        #[arg(short, long)]
        verbose: bool,
    },
    /// Remove all build outputs and the build record
    Clean,
    /// Rebuild whenever a module source or the config changes
    Watch {
        /// Number of parallel compile jobs
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Show commands and staleness decisions
        #[arg(short, long)]
        verbose: bool,
    },
    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn cancel_on_ctrlc() -> CancelToken {
    let token = CancelToken::new();
    let handle = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        eprintln!("{} Could not install Ctrl-C handler: {}", "!".yellow(), e);
    }
    token
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            jobs,
            timeout,
            dry_run,
            verbose,
        } => {
            let cfg = config::load_config(&cli.config)?;
            let options = BuildOptions {
                jobs,
                timeout: timeout.map(Duration::from_secs),
                dry_run,
                verbose,
                progress: std::io::stdout().is_terminal(),
                cancel: cancel_on_ctrlc(),
            };

            let report = build::build_project(&cfg, &options)?;
            if dry_run || verbose {
                report.print_table();
            }
            if dry_run {
                println!(
                    "{} {} job(s) would run",
                    "ℹ".blue(),
                    report.executed()
                );
                if report.has_failures() {
                    report.print_failures();
                    std::process::exit(1);
                }
                return Ok(());
            }
            if !report.success() {
                report.print_failures();
                report.print_hints();
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Clean => {
            let cfg = config::load_config(&cli.config)?;
            build::clean(&cfg)?;
            Ok(())
        }

        Commands::Watch { jobs, verbose } => {
            let options = BuildOptions {
                jobs,
                verbose,
                progress: std::io::stdout().is_terminal(),
                cancel: cancel_on_ctrlc(),
                ..Default::default()
            };
            build::watch(&cli.config, &options)
        }

        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}
