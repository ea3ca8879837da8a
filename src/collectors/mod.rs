//! Remote action backends.
//!
//! The orchestration core only ever holds an `Arc<dyn Collector>`; which
//! backend sits behind it is decided once at startup.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │      capture / orchestrator              │
//! ├──────────────────────────────────────────┤
//! │        Collector trait                   │
//! │  ┌──────────────┬──────────────────┐     │
//! │  │ SshCollector │ KubectlCollector │     │
//! │  └──────────────┴──────────────────┘     │
//! ├──────────────────────────────────────────┤
//! │   ClusterCollector (cluster-wide)        │
//! │  ┌──────────────────────────────────┐    │
//! │  │ KubernetesResourceCollector      │    │
//! │  └──────────────────────────────────┘    │
//! └──────────────────────────────────────────┘
//! ```

/// The `Collector` trait and argument helpers
pub mod collector;

/// SSH backend built on libssh2 sessions
pub mod ssh;

/// kubectl backend
pub mod kubectl;

/// Cluster-wide (non-node) collectors
pub mod cluster;

/// Local child process execution with captured or streamed output
pub mod process;

pub use cluster::{ClusterCollection, ClusterCollector, KubernetesResourceCollector};
pub use collector::Collector;
pub use kubectl::{KubectlCollector, KubectlConfig};
pub use ssh::{SshCollector, SshConfig};
