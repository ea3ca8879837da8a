//! Run-level utilities around the orchestration core.
//!
//! ## Components
//!
//! - **Archive**: tar.gz extraction of node payloads and final artifact assembly
//! - **Summary**: `summary.json` rendering
//! - **Shutdown**: cleanup hooks fired on Ctrl+C or normal completion
//!
//! ### Building the final artifact
//!
//! ```no_run
//! use ddc::models::SummaryInfo;
//! use ddc::utils::archive::{Archiver, TarGzArchiver};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let summary = SummaryInfo::new(chrono::Utc::now());
//! let path = TarGzArchiver.archive(Path::new("/tmp/staging"), &summary, Path::new("diag.tgz"))?;
//! println!("Created archive: {}", path.display());
//! # Ok(())
//! # }
//! ```

/// tar.gz extraction and final archive assembly
pub mod archive;

/// Collection summary rendering
pub mod summary;

/// Shutdown hook registry
pub mod shutdown;
