//! Collection orchestrator.
//!
//! [`execute`] resolves the node list, fans out one capture thread per node
//! under the shared transfer semaphore, runs cluster-wide collectors beside
//! them, then extracts every tarball into one staging tree and hands it to
//! the [`Archiver`].

pub mod cluster_stats;
pub mod transfer;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use crossbeam::channel::{bounded, tick, Receiver};
use log::{debug, error, info, warn};

use crate::capture::CaptureContext;
use crate::collectors::{ClusterCollection, ClusterCollector, Collector};
use crate::config::CollectionArgs;
use crate::constants::{HOST_LOG_DIR, REMOTE_AGENT_NAME, STATUS_REFRESH_INTERVAL_MS, VERSION};
use crate::error::DdcError;
use crate::models::{HostCaptureConfiguration, SummaryInfo};
use crate::stats::{RuntimeSnapshot, Stats};
use crate::threading::Semaphore;
use crate::utils::archive::Archiver;
use crate::utils::shutdown::ShutdownHooks;

use self::cluster_stats::scan_cluster_stats;
use self::transfer::{capture_and_record, extract_tarballs, FileLedger};

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub archive_path: PathBuf,
    pub summary: SummaryInfo,
}

/// Run a full collection and produce the final archive.
///
/// Per-node failures are recorded in the summary and never abort the run.
/// The run itself fails when no hosts are discovered, when no node tarball
/// survives transfer and extraction, or when the archive cannot be written.
pub fn execute(
    collector: Arc<dyn Collector>,
    archiver: &dyn Archiver,
    args: &CollectionArgs,
    hooks: &ShutdownHooks,
    stats: &Stats,
    cluster_collectors: &[Box<dyn ClusterCollector>],
) -> Result<CollectionReport> {
    let started = Instant::now();
    let mut summary = SummaryInfo::new(Utc::now());

    let work = tempfile::Builder::new()
        .prefix("ddc-")
        .tempdir()
        .context("Failed to create work directory")?;
    let work_path = work.path().to_path_buf();
    hooks.add(format!("remove {}", work_path.display()), move || {
        let _ = fs::remove_dir_all(&work_path);
    });

    let staging_dir = work.path().join("staging");
    let tarball_dir = work.path().join("tarballs");
    for dir in [&staging_dir, &tarball_dir] {
        fs::create_dir_all(dir).context(format!("Failed to create {}", dir.display()))?;
    }
    let local_agent = materialize_agent(&args.local_agent_path, &work.path().join("agent"))?;

    let coordinators = collector
        .discover_hosts(&args.coordinator_selector)
        .context(format!("Failed to discover coordinators with {}", collector.name()))?;
    let executors = collector
        .discover_hosts(&args.executor_selector)
        .context(format!("Failed to discover executors with {}", collector.name()))?;
    if coordinators.is_empty() && executors.is_empty() {
        error!("no hosts found. {}", collector.help_text());
        return Err(DdcError::NoHostsFound.into());
    }
    let (coordinators, executors) = dedupe_hosts(coordinators, executors);
    info!("found {} coordinators and {} executors", coordinators.len(), executors.len());

    let confs: Vec<HostCaptureConfiguration> = coordinators
        .iter()
        .map(|h| (h, true))
        .chain(executors.iter().map(|h| (h, false)))
        .map(|(host, is_coordinator)| HostCaptureConfiguration {
            host: host.clone(),
            is_coordinator,
            collector: Arc::clone(&collector),
            transfer_dir: args.transfer_dir.clone(),
            dremio_pat_token: args.dremio_pat_token.clone(),
            sudo_user: args.sudo_user.clone(),
            collection_mode: args.collection_mode.clone(),
        })
        .collect();

    summary.coordinators = coordinators;
    summary.executors = executors;
    summary.collection_mode = args.collection_mode.clone();
    summary.collectors_enabled = args.collectors_enabled.clone();
    summary.collectors_disabled = args.collectors_disabled.clone();

    stats.update_runtime(RuntimeSnapshot {
        version: VERSION.to_string(),
        log_file: display_opt(args.log_file.as_deref()),
        config_path: display_opt(args.config_path.as_deref()),
        collection_type: args.collection_mode.clone(),
        enabled: args.collectors_enabled.clone(),
        disabled: args.collectors_disabled.clone(),
        has_auth_token: args.dremio_pat_token.is_some(),
        transfers_complete: 0,
        total_transfers: confs.len(),
    });

    let transfer_gate = Semaphore::new(args.transfer_threads)?;
    let nodes_contacted = AtomicUsize::new(0);
    let ledger = FileLedger::new();
    let host_log_dir = staging_dir.join(HOST_LOG_DIR);
    let ctx = CaptureContext {
        stats,
        transfer_gate: &transfer_gate,
        local_agent: &local_agent,
        local_config: &args.local_config_path,
        output_dir: &tarball_dir,
        log_dir: Some(&host_log_dir),
        nodes_contacted: &nodes_contacted,
    };

    thread::scope(|s| {
        let (stop_ticker, ticker_stopped) = bounded::<()>(0);
        let ticker = (!args.disable_console_status).then(|| s.spawn(move || console_ticker(stats, ticker_stopped)));

        let cluster_handles: Vec<_> = cluster_collectors
            .iter()
            .map(|c| {
                let staging = staging_dir.as_path();
                (c.name(), s.spawn(move || c.collect(staging)))
            })
            .collect();

        let node_handles: Vec<_> = confs
            .iter()
            .map(|conf| {
                let skip_rest = !conf.is_coordinator || args.disable_rest_api;
                let (ctx, ledger) = (&ctx, &ledger);
                (conf.host.as_str(), s.spawn(move || capture_and_record(conf, ctx, skip_rest, ledger)))
            })
            .collect();

        for (host, handle) in node_handles {
            if handle.join().is_err() {
                error!("capture thread for {} panicked", host);
                ledger.record_failed(host);
            }
        }
        for (name, handle) in cluster_handles {
            match handle.join() {
                Ok(Ok(collection)) => record_cluster_collection(&ledger, collection),
                Ok(Err(e)) => warn!("cluster collector {} failed: {:#}", name, e),
                Err(_) => error!("cluster collector {} panicked", name),
            }
        }

        drop(stop_ticker);
        if let Some(ticker) = ticker {
            let _ = ticker.join();
        }
    });

    summary.cluster_info.total_nodes_attempted = confs.len();
    summary.cluster_info.number_nodes_contacted = nodes_contacted.load(Ordering::SeqCst);

    let transferred = ledger.collected_count();
    extract_tarballs(&ledger, &staging_dir, args.transfer_threads, hooks)?;
    debug!("{} of {} node tarballs extracted", ledger.collected_count(), transferred);

    let identity = scan_cluster_stats(&staging_dir);
    summary.dremio_version = identity.dremio_version;
    summary.cluster_id = identity.cluster_id;

    let (collected, failed, skipped) = ledger.snapshot();
    if ledger.collected_count() == 0 {
        error!("no node tarballs were collected, failed hosts: {}", failed.join(", "));
        return Err(DdcError::NoFilesTransferred.into());
    }

    summary.collected_files = collected;
    summary.failed_files = failed;
    summary.skipped_files = skipped;
    summary.finish(Utc::now());

    let archive_path = archiver
        .archive(&staging_dir, &summary, &args.output_file)
        .context("Failed to assemble final archive")?;

    info!(
        "collected {} files ({} bytes) from {}/{} nodes in {:?}, {} failed",
        summary.collected_files.len(),
        summary.total_bytes_collected,
        summary.cluster_info.number_nodes_contacted,
        summary.cluster_info.total_nodes_attempted,
        started.elapsed(),
        summary.failed_files.len()
    );
    Ok(CollectionReport { archive_path, summary })
}

/// Cluster-wide files go into the same ledger, but never as node tarballs
fn record_cluster_collection(ledger: &FileLedger, collection: ClusterCollection) {
    for file in collection.collected {
        ledger.record_cluster_file(file);
    }
    for skipped in collection.skipped {
        ledger.record_skipped(skipped);
    }
}

/// Copy the agent into the work area so every node receives the same bytes.
fn materialize_agent(source: &Path, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).context(format!("Failed to create {}", dir.display()))?;
    let dest = dir.join(REMOTE_AGENT_NAME);
    fs::copy(source, &dest).context(format!("Failed to copy agent {}", source.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))
            .context(format!("Failed to make {} executable", dest.display()))?;
    }

    debug!("agent materialized at {}", dest.display());
    Ok(dest)
}

fn console_ticker(stats: &Stats, stop: Receiver<()>) {
    let ticks = tick(Duration::from_millis(STATUS_REFRESH_INTERVAL_MS));
    loop {
        crossbeam::select! {
            recv(ticks) -> _ => stats.print_state(),
            recv(stop) -> _ => {
                stats.print_state();
                break;
            }
        }
    }
}

fn display_opt(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

/// Drop repeated host ids; a host listed in both roles stays a coordinator
fn dedupe_hosts(coordinators: Vec<String>, executors: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut keep = |role: &str, hosts: Vec<String>| -> Vec<String> {
        hosts
            .into_iter()
            .filter(|host| {
                let first = seen.insert(host.clone());
                if !first {
                    warn!("{} listed more than once, skipping the duplicate {} entry", host, role);
                }
                first
            })
            .collect()
    };
    let coordinators = keep("coordinator", coordinators);
    let executors = keep("executor", executors);
    (coordinators, executors)
}
