//! # fabrik - Incremental Build Driver
//!
//! fabrik compiles an ordered list of source modules to object files and links
//! them into one executable, redoing only the work whose inputs or command
//! changed since the last successful run.
//!
//! ## Quick Start
//!
//! ```bash
//! # fab.toml lists the modules; then:
//! fab build
//! fab clean
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Namer, staleness oracle, job executor and the build/clean coordinator
//! - [`config`] - Configuration parsing (`fab.toml`)
//! - [`state`] - Persisted build record
//! - [`error`] - Error taxonomy

/// Incremental build engine with parallel compilation.
pub mod build;

/// Configuration file parsing (`fab.toml`).
pub mod config;

/// Typed errors for configuration, job execution and build state.
pub mod error;

/// Persisted build record (`.fab/state.json`).
pub mod state;

/// Terminal UI utilities (tables).
pub mod ui;
