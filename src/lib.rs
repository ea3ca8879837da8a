//! # ddc
//!
//! Cluster-wide diagnostic collector for coordinator/executor database
//! clusters.
//!
//! ## Overview
//!
//! ddc reaches every coordinator and executor over SSH or `kubectl`, installs
//! a local collection agent on each node, runs it, pulls the resulting
//! per-node tarball back, and merges everything into a single archive with a
//! `summary.json` manifest.
//!
//! ## Features
//!
//! - **Interchangeable backends**: SSH sessions or `kubectl exec`/`cp`
//! - **Per-node isolation**: one failing node never aborts the others
//! - **Bounded transfers**: a semaphore caps simultaneous tarball copies
//! - **Live status**: a console block redrawn every second
//! - **Atomic output**: the final archive only appears once complete
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ddc::collectors::{Collector, SshCollector, SshConfig};
//! use ddc::config::CollectionArgs;
//! use ddc::orchestrator;
//! use ddc::stats::Stats;
//! use ddc::utils::archive::TarGzArchiver;
//! use ddc::utils::shutdown::ShutdownHooks;
//!
//! # fn main() -> anyhow::Result<()> {
//! let args = CollectionArgs {
//!     coordinator_selector: "10.0.0.1".to_string(),
//!     executor_selector: "10.0.0.2,10.0.0.3".to_string(),
//!     ssh_user: Some("dremio".to_string()),
//!     ..Default::default()
//! };
//! args.validate()?;
//!
//! let collector: Arc<dyn Collector> = Arc::new(SshCollector::new(SshConfig {
//!     username: "dremio".to_string(),
//!     ..Default::default()
//! }));
//! let report = orchestrator::execute(
//!     collector,
//!     &TarGzArchiver,
//!     &args,
//!     &ShutdownHooks::new(),
//!     &Stats::new(),
//!     &[],
//! )?;
//! println!("archive at {}", report.archive_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: YAML run configuration
//! - [`collectors`]: Remote action backends and cluster-wide collectors
//! - [`capture`]: Per-node capture state machine
//! - [`orchestrator`]: Fan-out, transfer bookkeeping, extraction and archiving
//! - [`stats`]: Live run statistics and console rendering
//! - [`threading`]: Worker pool and counting semaphore
//! - [`utils`]: Archive, summary and shutdown helpers
//! - [`security`]: Credential scrubbing for logs
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Run configuration loaded from YAML
pub mod config;

/// Typed error kinds
pub mod error;

/// Core data models and structures used throughout the application
pub mod models;

/// Remote action backends
pub mod collectors;

/// Per-node capture state machine
pub mod capture;

/// Collection orchestrator
pub mod orchestrator;

/// Live run statistics
pub mod stats;

/// Worker pool and counting semaphore
pub mod threading;

/// Archive, summary and shutdown utilities
pub mod utils;

/// Application constants and configuration values
pub mod constants;

/// Credential protection for logged commands and agent output
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
