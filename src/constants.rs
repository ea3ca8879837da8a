//! Global constants for the ddc application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

/// Version reported in the summary and compared against remote agents
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Remote layout
/// Default directory on each node used for the agent, its config and its tarball
pub const DEFAULT_TRANSFER_DIR: &str = "/tmp/ddc";

/// File name of the agent binary once copied to a node
pub const REMOTE_AGENT_NAME: &str = "ddc";

/// File name of the agent configuration pushed to each node
pub const REMOTE_CONFIG_NAME: &str = "ddc.yaml";

/// Log written by the agent next to its binary
pub const REMOTE_AGENT_LOG: &str = "ddc.log";

/// Extension of the per-node tarball written by the agent
pub const TARBALL_EXTENSION: &str = "tar.gz";

// Concurrency
/// Default number of simultaneous node tarball transfers
pub const DEFAULT_TRANSFER_THREADS: usize = 2;

/// Emit aggregate pool progress every this many completed jobs
pub const DEFAULT_POOL_LOGGING_FREQUENCY: usize = 10;

/// Refresh interval of the live console status block
pub const STATUS_REFRESH_INTERVAL_MS: u64 = 1000;

// Reporting
/// Maximum characters of agent output kept in a FAILED status line
pub const FAILURE_OUTPUT_LIMIT: usize = 350;

/// Summary document written into the staging tree
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// Marker written next to the summary once a run finished assembling
pub const COMPLETION_MARKER_NAME: &str = "completed";

/// Per-node identity marker produced by the agent
pub const CLUSTER_STATS_FILE_NAME: &str = "cluster-stats.json";

/// Directory under the staging tree holding per-node agent logs
pub const HOST_LOG_DIR: &str = "ddc-logs";

/// Directory under the staging tree holding cluster-wide listings
pub const CLUSTER_COLLECTION_DIR: &str = "kubernetes";

/// Default final artifact name when none is configured
pub const DEFAULT_OUTPUT_FILE: &str = "diag.tgz";

// Status labels
pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_FAILED_PREFIX: &str = "FAILED";

// SSH
/// Default SSH port
pub const SSH_DEFAULT_PORT: u16 = 22;

/// Default connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

// Kubernetes
/// Resources listed by the cluster-wide kubectl collector
pub const KUBERNETES_RESOURCES: &[&str] = &[
    "pods",
    "services",
    "statefulsets",
    "deployments",
    "configmaps",
    "persistentvolumeclaims",
    "events",
];

// Agent invocation flags
pub const AGENT_LOCAL_COLLECT: &str = "local-collect";
pub const AGENT_TARBALL_OUT_DIR_FLAG: &str = "--tarball-out-dir";
pub const AGENT_DISABLE_REST_FLAG: &str = "--disable-rest-api";
pub const AGENT_PAT_TOKEN_FLAG: &str = "--dremio-pat-token";

/// Environment variable read for the auth token when the YAML has none
pub const PAT_TOKEN_ENV: &str = "DREMIO_PAT_TOKEN";

/// Application log file name
pub const APP_LOG_FILE: &str = "ddc.log";
