//! Transfer bookkeeping and tarball extraction.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::capture::{self, CaptureContext};
use crate::constants::DEFAULT_POOL_LOGGING_FREQUENCY;
use crate::models::{CollectedFile, HostCaptureConfiguration};
use crate::threading::{Job, WorkerPool};
use crate::utils::archive::extract_tar_gz;
use crate::utils::shutdown::ShutdownHooks;

/// A transferred node tarball waiting for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTarball {
    pub host: String,
    pub local_path: PathBuf,
}

#[derive(Debug, Default)]
struct Ledger {
    /// Node tarballs keyed by the host that produced them
    collected: Vec<(String, CollectedFile)>,
    cluster_files: Vec<CollectedFile>,
    failed: Vec<String>,
    skipped: Vec<String>,
    tarballs: Vec<PendingTarball>,
}

/// Collected, failed and skipped file lists behind one lock, so no reader
/// ever sees a node half-moved between them.
#[derive(Debug, Default, Clone)]
pub struct FileLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl FileLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_collected(&self, host: &str, file: CollectedFile, local_path: PathBuf) {
        let mut ledger = self.lock();
        ledger.collected.push((host.to_string(), file));
        ledger.tarballs.push(PendingTarball {
            host: host.to_string(),
            local_path,
        });
    }

    /// Files from cluster-wide collectors; these never count as node output
    pub fn record_cluster_file(&self, file: CollectedFile) {
        self.lock().cluster_files.push(file);
    }

    pub fn record_failed(&self, id: impl Into<String>) {
        self.lock().failed.push(id.into());
    }

    pub fn record_skipped(&self, id: impl Into<String>) {
        self.lock().skipped.push(id.into());
    }

    /// Move `host` from the collected list to the failed list
    pub fn demote(&self, host: &str) {
        let mut ledger = self.lock();
        ledger.collected.retain(|(owner, _)| owner != host);
        ledger.failed.push(host.to_string());
    }

    /// Node tarballs currently counted as collected
    pub fn collected_count(&self) -> usize {
        self.lock().collected.len()
    }

    pub fn take_tarballs(&self) -> Vec<PendingTarball> {
        std::mem::take(&mut self.lock().tarballs)
    }

    /// Snapshot as (collected, failed, skipped); node tarballs list first
    pub fn snapshot(&self) -> (Vec<CollectedFile>, Vec<String>, Vec<String>) {
        let ledger = self.lock();
        let collected = ledger
            .collected
            .iter()
            .map(|(_, file)| file)
            .chain(ledger.cluster_files.iter())
            .cloned()
            .collect();
        (collected, ledger.failed.clone(), ledger.skipped.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run one node's capture and record its tarball or its failure.
pub fn capture_and_record(
    conf: &HostCaptureConfiguration,
    ctx: &CaptureContext<'_>,
    skip_rest_collect: bool,
    ledger: &FileLedger,
) {
    match capture::capture(conf, ctx, skip_rest_collect) {
        Ok(outcome) => {
            let name = outcome
                .local_tarball
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| outcome.local_tarball.display().to_string());
            ledger.record_collected(
                &conf.host,
                CollectedFile {
                    path: name,
                    size: outcome.bytes,
                },
                outcome.local_tarball,
            );
        }
        Err(e) => {
            warn!("{} produced no tarball: {:#}", conf.host, e);
            ledger.record_failed(&conf.host);
        }
    }
}

/// Extract every pending tarball into `staging_dir` on a worker pool,
/// deleting each tarball right after extraction.
///
/// A tarball that cannot be extracted moves its node from the collected
/// list to the failed list.
pub fn extract_tarballs(
    ledger: &FileLedger,
    staging_dir: &Path,
    worker_count: usize,
    hooks: &ShutdownHooks,
) -> Result<()> {
    let tarballs = ledger.take_tarballs();
    if tarballs.is_empty() {
        debug!("no tarballs to extract");
        return Ok(());
    }

    let mut pool = WorkerPool::new(worker_count, DEFAULT_POOL_LOGGING_FREQUENCY)?;
    for tarball in tarballs {
        let cleanup_path = tarball.local_path.clone();
        hooks.add(format!("remove {}", cleanup_path.display()), move || {
            let _ = fs::remove_file(&cleanup_path);
        });

        let ledger = ledger.clone();
        let staging = staging_dir.to_path_buf();
        pool.add_job(Job::new(format!("extract {}", tarball.host), move || {
            extract_one(&tarball, &staging, &ledger)
        }))?;
    }

    info!("extracting {} node tarballs with {} workers", pool.total_jobs(), pool.worker_count());
    pool.process_and_wait()
}

fn extract_one(tarball: &PendingTarball, staging: &Path, ledger: &FileLedger) -> Result<()> {
    let result = extract_tar_gz(&tarball.local_path, staging);

    if let Err(e) = fs::remove_file(&tarball.local_path) {
        debug!("unable to remove {}: {}", tarball.local_path.display(), e);
    }

    match result {
        Ok(entries) => {
            debug!("{}: {} entries extracted", tarball.host, entries);
            Ok(())
        }
        Err(e) => {
            error!("unable to extract tarball of {}: {:#}", tarball.host, e);
            ledger.demote(&tarball.host);
            Err(e)
        }
    }
}
