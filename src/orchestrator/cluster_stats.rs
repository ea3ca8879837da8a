use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use walkdir::WalkDir;

use crate::constants::CLUSTER_STATS_FILE_NAME;
use crate::models::ClusterStats;

/// Per-node version and cluster id maps, keyed by node name
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub dremio_version: BTreeMap<String, String>,
    pub cluster_id: BTreeMap<String, String>,
}

/// Walk `staging_dir` for `cluster-stats.json` markers.
///
/// Unreadable or malformed markers are logged and skipped.
pub fn scan_cluster_stats(staging_dir: &Path) -> ClusterIdentity {
    let mut identity = ClusterIdentity::default();

    for entry in WalkDir::new(staging_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == CLUSTER_STATS_FILE_NAME)
    {
        match read_marker(entry.path()) {
            Ok(stats) => {
                debug!("{} runs {} in cluster {}", stats.node_name, stats.dremio_version, stats.cluster_id);
                identity.dremio_version.insert(stats.node_name.clone(), stats.dremio_version);
                identity.cluster_id.insert(stats.node_name, stats.cluster_id);
            }
            Err(e) => warn!("ignoring cluster marker: {:#}", e),
        }
    }
    identity
}

fn read_marker(path: &Path) -> Result<ClusterStats> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_collects_valid_markers() {
        let dir = TempDir::new().unwrap();
        let node_a = dir.path().join("node-a/dremio");
        let node_b = dir.path().join("node-b");
        fs::create_dir_all(&node_a).unwrap();
        fs::create_dir_all(&node_b).unwrap();
        fs::write(
            node_a.join(CLUSTER_STATS_FILE_NAME),
            r#"{"NodeName":"node-a","DremioVersion":"24.3.0","ClusterID":"c-1","Extra":true}"#,
        )
        .unwrap();
        fs::write(node_b.join(CLUSTER_STATS_FILE_NAME), "{ not json").unwrap();

        let identity = scan_cluster_stats(dir.path());
        assert_eq!(identity.dremio_version.len(), 1);
        assert_eq!(identity.dremio_version["node-a"], "24.3.0");
        assert_eq!(identity.cluster_id["node-a"], "c-1");
    }

    #[test]
    fn test_scan_empty_tree() {
        let dir = TempDir::new().unwrap();
        assert_eq!(scan_cluster_stats(dir.path()), ClusterIdentity::default());
    }
}
