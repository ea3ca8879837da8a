use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collectors::collector::Collector;

/// A node tarball that made it back to the control host
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectedFile {
    pub path: String,
    pub size: u64,
}

/// Everything one node's capture needs to know, fixed at fan-out time.
#[derive(Clone)]
pub struct HostCaptureConfiguration {
    pub host: String,
    pub is_coordinator: bool,
    pub collector: Arc<dyn Collector>,
    pub transfer_dir: String,
    pub dremio_pat_token: Option<String>,
    pub sudo_user: Option<String>,
    pub collection_mode: String,
}

impl HostCaptureConfiguration {
    pub fn remote_agent_path(&self) -> String {
        format!("{}/{}", self.transfer_dir.trim_end_matches('/'), crate::constants::REMOTE_AGENT_NAME)
    }

    pub fn remote_config_path(&self) -> String {
        format!("{}/{}", self.transfer_dir.trim_end_matches('/'), crate::constants::REMOTE_CONFIG_NAME)
    }

    pub fn remote_agent_log_path(&self) -> String {
        format!("{}/{}", self.transfer_dir.trim_end_matches('/'), crate::constants::REMOTE_AGENT_LOG)
    }

    pub fn remote_tarball_path(&self, hostname: &str) -> String {
        format!(
            "{}/{}.{}",
            self.transfer_dir.trim_end_matches('/'),
            hostname,
            crate::constants::TARBALL_EXTENSION
        )
    }
}

impl fmt::Debug for HostCaptureConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCaptureConfiguration")
            .field("host", &self.host)
            .field("is_coordinator", &self.is_coordinator)
            .field("collector", &self.collector.name())
            .field("transfer_dir", &self.transfer_dir)
            .field("dremio_pat_token", &self.dremio_pat_token.as_ref().map(|_| "<REDACTED>"))
            .field("sudo_user", &self.sudo_user)
            .field("collection_mode", &self.collection_mode)
            .finish()
    }
}

/// Identity marker the agent drops into each node's payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClusterStats {
    #[serde(rename = "NodeName")]
    pub node_name: String,
    #[serde(rename = "DremioVersion")]
    pub dremio_version: String,
    #[serde(rename = "ClusterID")]
    pub cluster_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub total_nodes_attempted: usize,
    pub number_nodes_contacted: usize,
}

/// Run-level report written as `summary.json`.
///
/// Built by the orchestrator only after every node thread has joined, so
/// it carries no lock of its own.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryInfo {
    pub collection_id: String,
    pub cluster_info: ClusterInfo,
    pub collected_files: Vec<CollectedFile>,
    pub failed_files: Vec<String>,
    pub skipped_files: Vec<String>,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub total_runtime_seconds: i64,
    pub total_bytes_collected: u64,
    pub executors: Vec<String>,
    pub coordinators: Vec<String>,
    pub dremio_version: BTreeMap<String, String>,
    pub cluster_id: BTreeMap<String, String>,
    pub ddc_version: String,
    pub collection_mode: String,
    pub collectors_enabled: Vec<String>,
    pub collectors_disabled: Vec<String>,
}

impl SummaryInfo {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            collection_id: uuid::Uuid::new_v4().to_string(),
            cluster_info: ClusterInfo::default(),
            collected_files: Vec::new(),
            failed_files: Vec::new(),
            skipped_files: Vec::new(),
            start_timestamp: start,
            end_timestamp: start,
            total_runtime_seconds: 0,
            total_bytes_collected: 0,
            executors: Vec::new(),
            coordinators: Vec::new(),
            dremio_version: BTreeMap::new(),
            cluster_id: BTreeMap::new(),
            ddc_version: crate::constants::VERSION.to_string(),
            collection_mode: String::new(),
            collectors_enabled: Vec::new(),
            collectors_disabled: Vec::new(),
        }
    }

    /// Stamp the end of the run and derive the elapsed seconds
    pub fn finish(&mut self, end: DateTime<Utc>) {
        self.end_timestamp = end;
        self.total_runtime_seconds = (end - self.start_timestamp).num_seconds();
        self.total_bytes_collected = self.collected_files.iter().map(|f| f.size).sum();
    }
}
