//! Live run statistics shared by every node thread.
//!
//! The reporter keeps one outer lock over the run-level snapshot and the
//! node map, and one inner lock per node. Writers hold the outer lock for the
//! whole update, so the completed-transfer counter and a node's terminal
//! status change together. Readers clone node handles under the outer lock
//! and read them through the inner lock after releasing the map. Lock order
//! is always outer then inner.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::constants::{STATUS_COMPLETED, STATUS_FAILED_PREFIX};

/// Run-level values shown at the top of the console block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    pub version: String,
    pub log_file: String,
    pub config_path: String,
    pub collection_type: String,
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    pub has_auth_token: bool,
    pub transfers_complete: usize,
    pub total_transfers: usize,
}

/// Live status of one node
#[derive(Debug)]
pub struct NodeCaptureStats {
    status: String,
    start: Instant,
    end: Option<Instant>,
}

impl NodeCaptureStats {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            start: Instant::now(),
            end: None,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn elapsed(&self) -> Duration {
        match self.end {
            Some(end) => end.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.end.is_some()
    }
}

#[derive(Debug, Default)]
struct StatsState {
    runtime: RuntimeSnapshot,
    nodes: BTreeMap<String, Arc<Mutex<NodeCaptureStats>>>,
}

/// Thread-safe reporter polled by the console ticker.
#[derive(Debug, Default)]
pub struct Stats {
    state: Mutex<StatsState>,
}

pub fn is_terminal_status(status: &str) -> bool {
    status == STATUS_COMPLETED || status.starts_with(STATUS_FAILED_PREFIX)
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole run-level snapshot.
    pub fn update_runtime(&self, runtime: RuntimeSnapshot) {
        self.lock().runtime = runtime;
    }

    /// Insert or update one node's status.
    ///
    /// The first terminal status a node reaches stamps its end time and bumps
    /// the completed-transfer counter; later terminal updates only change the
    /// text.
    pub fn update_node_state(&self, host: &str, status: &str) {
        let mut state = self.lock();
        let node = state
            .nodes
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(NodeCaptureStats::new(status))))
            .clone();

        let mut node = node.lock().unwrap_or_else(PoisonError::into_inner);
        node.status = status.to_string();
        if node.end.is_none() && is_terminal_status(status) {
            node.end = Some(Instant::now());
            state.runtime.transfers_complete += 1;
        }
    }

    pub fn transfers_complete(&self) -> usize {
        self.lock().runtime.transfers_complete
    }

    pub fn runtime(&self) -> RuntimeSnapshot {
        self.lock().runtime.clone()
    }

    pub fn node_status(&self, host: &str) -> Option<String> {
        let node = self.lock().nodes.get(host).cloned()?;
        let node = node.lock().unwrap_or_else(PoisonError::into_inner);
        Some(node.status.clone())
    }

    /// Render the console block without clearing the screen
    pub fn render_state(&self) -> String {
        let (rt, nodes) = {
            let state = self.lock();
            let nodes: Vec<_> = state.nodes.iter().map(|(h, n)| (h.clone(), Arc::clone(n))).collect();
            (state.runtime.clone(), nodes)
        };

        let mut out = String::new();
        let _ = writeln!(out, "ddc v{}", rt.version);
        let _ = writeln!(out, "yaml:            {}", rt.config_path);
        let _ = writeln!(out, "log file:        {}", rt.log_file);
        let _ = writeln!(out, "collection type: {}", rt.collection_type);
        let _ = writeln!(out, "auth token:      {}", if rt.has_auth_token { "yes" } else { "no" });
        let _ = writeln!(out, "collectors on:   {}", rt.enabled.join(", "));
        let _ = writeln!(out, "collectors off:  {}", rt.disabled.join(", "));
        let _ = writeln!(out, "transfers:       {}/{}", rt.transfers_complete, rt.total_transfers);
        let _ = writeln!(out);

        // BTreeMap iteration is already sorted by host key
        for (host, node) in &nodes {
            let node = node.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(out, "{:<40} {:>6}s  {}", host, node.elapsed().as_secs(), node.status);
        }
        out
    }

    /// Clear the terminal and print the current state
    pub fn print_state(&self) {
        let rendered = self.render_state();
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "\x1b[H\x1b[2J{}", rendered);
        let _ = stdout.flush();
    }

    fn lock(&self) -> MutexGuard<'_, StatsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_twice_counts_once() {
        let stats = Stats::new();
        stats.update_node_state("node-a", "STARTING");
        stats.update_node_state("node-a", "COMPLETED");
        stats.update_node_state("node-a", "COMPLETED");

        assert_eq!(stats.transfers_complete(), 1);
    }

    #[test]
    fn test_failed_prefix_is_terminal() {
        let stats = Stats::new();
        stats.update_node_state("node-a", "FAILED - LOCAL-COLLECT - exit 1");
        stats.update_node_state("node-b", "COLLECTING");

        assert_eq!(stats.transfers_complete(), 1);
        assert_eq!(stats.node_status("node-b").as_deref(), Some("COLLECTING"));
        assert!(stats.node_status("node-c").is_none());
    }

    #[test]
    fn test_update_runtime_replaces_snapshot() {
        let stats = Stats::new();
        stats.update_runtime(RuntimeSnapshot {
            version: "1.0".to_string(),
            total_transfers: 4,
            ..Default::default()
        });
        stats.update_runtime(RuntimeSnapshot {
            version: "2.0".to_string(),
            total_transfers: 3,
            ..Default::default()
        });

        let runtime = stats.runtime();
        assert_eq!(runtime.version, "2.0");
        assert_eq!(runtime.total_transfers, 3);
    }

    #[test]
    fn test_render_sorts_hosts_and_shows_ratio() {
        let stats = Stats::new();
        stats.update_runtime(RuntimeSnapshot {
            version: "0.3.0".to_string(),
            collection_type: "light".to_string(),
            total_transfers: 2,
            ..Default::default()
        });
        stats.update_node_state("zeta", "COLLECTING");
        stats.update_node_state("alpha", "COMPLETED");

        let rendered = stats.render_state();
        assert!(rendered.contains("transfers:       1/2"));
        assert!(rendered.contains("collection type: light"));
        let alpha = rendered.find("alpha").unwrap();
        let zeta = rendered.find("zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_concurrent_terminal_updates() {
        let stats = Stats::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let stats = &stats;
                s.spawn(move || {
                    let host = format!("node-{}", i % 4);
                    stats.update_node_state(&host, "COLLECTING");
                    stats.update_node_state(&host, "COMPLETED");
                });
            }
        });
        assert_eq!(stats.transfers_complete(), 4);
    }

    #[test]
    fn test_render_while_nodes_update() {
        let stats = Stats::new();
        std::thread::scope(|s| {
            for i in 0..4 {
                let stats = &stats;
                s.spawn(move || {
                    let host = format!("node-{}", i);
                    for stage in ["STARTING", "COLLECTING", "TARBALL TRANSFER", "COMPLETED"] {
                        stats.update_node_state(&host, stage);
                    }
                });
            }
            for _ in 0..20 {
                let rendered = stats.render_state();
                assert!(rendered.contains("transfers:"));
            }
        });

        let rendered = stats.render_state();
        assert_eq!(rendered.matches("COMPLETED").count(), 4);
        assert_eq!(stats.node_status("node-3").as_deref(), Some("COMPLETED"));
        assert_eq!(stats.transfers_complete(), 4);
    }

    #[test]
    fn test_terminal_node_elapsed_is_frozen() {
        let stats = Stats::new();
        stats.update_node_state("node-a", "COMPLETED");
        let state = stats.lock();
        let node = state.nodes["node-a"].lock().unwrap();
        assert!(node.is_terminal());
        let first = node.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(node.elapsed(), first);
    }
}
