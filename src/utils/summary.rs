use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::constants::SUMMARY_FILE_NAME;
use crate::models::SummaryInfo;

/// Render the run summary as pretty JSON.
///
/// # Example Output
///
/// ```json
/// {
///   "collectionId": "550e8400-e29b-41d4-a716-446655440000",
///   "clusterInfo": { "totalNodesAttempted": 5, "numberNodesContacted": 5 },
///   "collectedFiles": [{ "path": "node-1.tar.gz", "size": 10240 }],
///   "failedFiles": [],
///   "skippedFiles": [],
///   "startTimestamp": "2024-01-15T14:30:52Z",
///   ...
/// }
/// ```
pub fn create_collection_summary(summary: &SummaryInfo) -> Result<String> {
    serde_json::to_string_pretty(summary).context("Failed to serialize collection summary to JSON")
}

/// Write `summary.json` into `dir` and return its path
pub fn write_summary(dir: &Path, summary: &SummaryInfo) -> Result<PathBuf> {
    let json = create_collection_summary(summary)?;
    let path = dir.join(SUMMARY_FILE_NAME);
    fs::write(&path, json).context(format!("Failed to write summary to {}", path.display()))?;

    debug!("Wrote collection summary to {}", path.display());
    Ok(path)
}

pub fn read_summary(path: &Path) -> Result<SummaryInfo> {
    let content = fs::read_to_string(path).context(format!("Failed to read summary {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse summary {}", path.display()))
}
