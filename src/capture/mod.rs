//! Per-node capture state machine.
//!
//! One call to [`capture`] walks a single node through
//!
//! ```text
//! STARTING → CREATING REMOTE DIR → DDC COPY → SETTING PERMISSIONS → COPY DDC.YAML
//!          → COLLECTING → COLLECTED → COLLECT HOSTNAME → TARBALL TRANSFER → COMPLETED
//! ```
//!
//! Any step may fail, which publishes `FAILED - <STAGE> - <reason>` for that
//! node and returns; sibling nodes are unaffected. Remote cleanup commands
//! registered along the way run when the call returns, whatever the outcome.

pub mod host_log;

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::collectors::collector::{to_args, Collector};
use crate::constants::{
    AGENT_DISABLE_REST_FLAG, AGENT_LOCAL_COLLECT, AGENT_PAT_TOKEN_FLAG, AGENT_TARBALL_OUT_DIR_FLAG,
    FAILURE_OUTPUT_LIMIT, STATUS_FAILED_PREFIX, TARBALL_EXTENSION, VERSION,
};
use crate::error::DdcError;
use crate::models::HostCaptureConfiguration;
use crate::security::{mask_command, scrub_secret};
use crate::stats::Stats;
use crate::threading::Semaphore;

pub use host_log::HostLog;

/// Agent output lines kept in memory for failure reporting
const OUTPUT_TAIL_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Starting,
    CreatingRemoteDir,
    DdcCopy,
    SettingPermissions,
    CopyDdcYaml,
    Collecting,
    Collected,
    CollectHostname,
    TarballTransfer,
    Completed,
}

impl CaptureStage {
    pub fn label(self) -> &'static str {
        match self {
            CaptureStage::Starting => "STARTING",
            CaptureStage::CreatingRemoteDir => "CREATING REMOTE DIR",
            CaptureStage::DdcCopy => "DDC COPY",
            CaptureStage::SettingPermissions => "SETTING PERMISSIONS",
            CaptureStage::CopyDdcYaml => "COPY DDC.YAML",
            CaptureStage::Collecting => "COLLECTING",
            CaptureStage::Collected => "COLLECTED",
            CaptureStage::CollectHostname => "COLLECT HOSTNAME",
            CaptureStage::TarballTransfer => "TARBALL TRANSFER",
            CaptureStage::Completed => "COMPLETED",
        }
    }

    /// Tag used inside a `FAILED - <tag> - <reason>` status
    pub fn failure_tag(self) -> &'static str {
        match self {
            CaptureStage::Starting => "STARTING",
            CaptureStage::CreatingRemoteDir => "CREATE-REMOTE-DIR",
            CaptureStage::DdcCopy => "DDC-COPY",
            CaptureStage::SettingPermissions => "CHMOD",
            CaptureStage::CopyDdcYaml => "COPY-DDC-YAML",
            CaptureStage::Collecting | CaptureStage::Collected => "LOCAL-COLLECT",
            CaptureStage::CollectHostname => "HOSTNAME",
            CaptureStage::TarballTransfer => "TARBALL-TRANSFER",
            CaptureStage::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shared, run-wide inputs for every node capture
pub struct CaptureContext<'a> {
    pub stats: &'a Stats,
    pub transfer_gate: &'a Semaphore,
    pub local_agent: &'a Path,
    pub local_config: &'a Path,
    /// Where node tarballs land on the control host
    pub output_dir: &'a Path,
    /// Where per-host agent logs are written; `None` keeps them in the app log only
    pub log_dir: Option<&'a Path>,
    pub nodes_contacted: &'a AtomicUsize,
}

/// A node tarball sitting on the control host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub host: String,
    pub hostname: String,
    pub local_tarball: PathBuf,
    pub bytes: u64,
}

/// Remote commands run when the capture returns, newest first.
struct RemoteCleanup<'a> {
    collector: &'a dyn Collector,
    host: &'a str,
    commands: Vec<Vec<String>>,
}

impl<'a> RemoteCleanup<'a> {
    fn new(collector: &'a dyn Collector, host: &'a str) -> Self {
        Self {
            collector,
            host,
            commands: Vec::new(),
        }
    }

    fn remove_on_exit(&mut self, remote_path: &str) {
        self.commands.push(to_args(&["rm", "-f", remote_path]));
    }
}

impl Drop for RemoteCleanup<'_> {
    fn drop(&mut self) {
        for command in self.commands.iter().rev() {
            match self.collector.execute(self.host, command) {
                Ok(_) => debug!("{} cleanup: {}", self.host, mask_command(command)),
                Err(e) => warn!("{} cleanup '{}' failed: {}", self.host, mask_command(command), e),
            }
        }
    }
}

struct NodeCapture<'a, 'c> {
    conf: &'a HostCaptureConfiguration,
    ctx: &'a CaptureContext<'c>,
    contacted: bool,
}

impl NodeCapture<'_, '_> {
    fn host(&self) -> &str {
        &self.conf.host
    }

    fn enter(&self, stage: CaptureStage) {
        debug!("{} - {}", self.host(), stage);
        self.ctx.stats.update_node_state(self.host(), stage.label());
    }

    fn mark_contacted(&mut self) {
        if !self.contacted {
            self.contacted = true;
            self.ctx.nodes_contacted.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fail(&self, stage: CaptureStage, reason: &str) -> anyhow::Error {
        let reason = scrub_secret(&reason.replace('\n', " "), self.conf.dremio_pat_token.as_deref());
        let reason = truncate_tail(&reason, FAILURE_OUTPUT_LIMIT);
        let status = format!("{} - {} - {}", STATUS_FAILED_PREFIX, stage.failure_tag(), reason);
        error!("{} - {}", self.host(), status);
        self.ctx.stats.update_node_state(self.host(), &status);

        DdcError::NodeFailure {
            host: self.host().to_string(),
            stage: stage.label().to_string(),
            reason,
        }
        .into()
    }

    fn execute(&mut self, stage: CaptureStage, args: &[String]) -> Result<String> {
        match self.conf.collector.execute(self.host(), args) {
            Ok(out) => {
                self.mark_contacted();
                Ok(out)
            }
            Err(e) => Err(self.fail(stage, &format!("{:#}", e))),
        }
    }

    fn copy_to_host(&mut self, stage: CaptureStage, source: &Path, dest: &str) -> Result<()> {
        match self.conf.collector.copy_to_host(self.host(), source, dest) {
            Ok(_) => {
                self.mark_contacted();
                Ok(())
            }
            Err(e) => Err(self.fail(stage, &format!("copy {} to {}: {:#}", source.display(), dest, e))),
        }
    }

    /// True when the node already runs an agent of our version
    fn agent_is_current(&mut self) -> bool {
        let args = vec![self.conf.remote_agent_path(), "version".to_string()];
        match self.conf.collector.execute(self.host(), &args) {
            Ok(out) => {
                self.mark_contacted();
                out.split_whitespace().any(|word| word.trim_start_matches('v') == VERSION)
            }
            Err(e) => {
                debug!("{} has no usable agent: {}", self.host(), e);
                false
            }
        }
    }

    fn agent_command(&self, skip_rest_collect: bool) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(user) = &self.conf.sudo_user {
            args.extend(to_args(&["sudo", "-u", user]));
        }
        args.push(self.conf.remote_agent_path());
        args.push(AGENT_LOCAL_COLLECT.to_string());
        args.push(AGENT_TARBALL_OUT_DIR_FLAG.to_string());
        args.push(self.conf.transfer_dir.clone());

        if skip_rest_collect {
            args.push(AGENT_DISABLE_REST_FLAG.to_string());
        } else if let Some(token) = &self.conf.dremio_pat_token {
            args.push(AGENT_PAT_TOKEN_FLAG.to_string());
            args.push(token.clone());
        }
        args
    }

    fn run(&mut self, skip_rest_collect: bool) -> Result<CaptureOutcome> {
        let conf = self.conf;
        let collector = conf.collector.as_ref();
        let host = conf.host.as_str();
        let mut cleanup = RemoteCleanup::new(collector, host);

        self.enter(CaptureStage::Starting);

        let remote_agent = self.conf.remote_agent_path();
        if self.agent_is_current() {
            info!("{} already has ddc {}, skipping agent install", host, VERSION);
        } else {
            self.enter(CaptureStage::CreatingRemoteDir);
            self.execute(CaptureStage::CreatingRemoteDir, &to_args(&["mkdir", "-p", &self.conf.transfer_dir]))?;

            self.enter(CaptureStage::DdcCopy);
            self.copy_to_host(CaptureStage::DdcCopy, self.ctx.local_agent, &remote_agent)?;
            cleanup.remove_on_exit(&remote_agent);
            cleanup.remove_on_exit(&self.conf.remote_agent_log_path());

            self.enter(CaptureStage::SettingPermissions);
            self.execute(CaptureStage::SettingPermissions, &to_args(&["chmod", "+x", &remote_agent]))?;
        }

        self.enter(CaptureStage::CopyDdcYaml);
        let remote_config = self.conf.remote_config_path();
        self.copy_to_host(CaptureStage::CopyDdcYaml, self.ctx.local_config, &remote_config)?;
        cleanup.remove_on_exit(&remote_config);

        self.enter(CaptureStage::Collecting);
        let command = self.agent_command(skip_rest_collect);
        info!("{} running {}", host, mask_command(&command));

        let mut host_log = match self.ctx.log_dir {
            Some(dir) => HostLog::create(dir, host).unwrap_or_else(|e| {
                warn!("{}: {:#}", host, e);
                HostLog::disabled(host)
            }),
            None => HostLog::disabled(host),
        };
        let token = conf.dremio_pat_token.as_deref();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        let result = collector.execute_and_stream(
            host,
            &mut |line| {
                let line = scrub_secret(line, token);
                host_log.write_line(&line);
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            },
            &command,
        );
        drop(host_log);

        if let Err(e) = result {
            let output = tail.into_iter().collect::<Vec<_>>().join(" ");
            let reason = if output.trim().is_empty() { format!("{:#}", e) } else { output };
            return Err(self.fail(CaptureStage::Collecting, &reason));
        }
        self.mark_contacted();
        self.enter(CaptureStage::Collected);

        self.enter(CaptureStage::CollectHostname);
        let hostname = match collector.execute(host, &to_args(&["hostname"])) {
            Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
            Ok(_) => {
                warn!("{} returned an empty hostname, using the host identifier", host);
                host.to_string()
            }
            Err(e) => {
                warn!("unable to resolve hostname of {}, using the host identifier: {}", host, e);
                host.to_string()
            }
        };

        self.enter(CaptureStage::TarballTransfer);
        let remote_tarball = self.conf.remote_tarball_path(&hostname);
        cleanup.remove_on_exit(&remote_tarball);

        let local_tarball = self
            .ctx
            .output_dir
            .join(format!("{}.{}", hostname, TARBALL_EXTENSION));
        let bytes = {
            let _permit = self
                .ctx
                .transfer_gate
                .acquire()
                .map_err(|e| self.fail(CaptureStage::TarballTransfer, &format!("{:#}", e)))?;

            if let Err(e) = collector.copy_from_host(host, &remote_tarball, &local_tarball) {
                return Err(self.fail(
                    CaptureStage::TarballTransfer,
                    &format!("copy {} from {}: {:#}", remote_tarball, host, e),
                ));
            }
            tarball_size(&local_tarball)
        };

        info!("{} transferred {} ({} bytes)", host, local_tarball.display(), bytes);
        self.enter(CaptureStage::Completed);

        Ok(CaptureOutcome {
            host: host.to_string(),
            hostname,
            local_tarball,
            bytes,
        })
    }
}

/// Drive one node through the capture state machine.
///
/// Coordinators pass `skip_rest_collect = false` so the agent may query the
/// REST API; executors always skip it.
pub fn capture(
    conf: &HostCaptureConfiguration,
    ctx: &CaptureContext<'_>,
    skip_rest_collect: bool,
) -> Result<CaptureOutcome> {
    let mut node = NodeCapture {
        conf,
        ctx,
        contacted: false,
    };
    node.run(skip_rest_collect)
}

/// Size of a transferred tarball; 0 with a warning when it cannot be read.
pub fn tarball_size(path: &Path) -> u64 {
    match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            warn!("unable to stat {}, recording size 0: {}", path.display(), e);
            0
        }
    }
}

/// Keep the last `limit` characters of `text`.
pub fn truncate_tail(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    text.chars().skip(count - limit).collect()
}
