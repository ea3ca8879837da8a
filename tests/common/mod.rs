//! Shared fixtures for the integration tests.
//!
//! `FakeCluster` simulates every node's filesystem under one temp dir and
//! answers the commands the capture state machine issues, so whole runs
//! can be exercised without SSH or Kubernetes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tempfile::TempDir;

use ddc::collectors::Collector;
use ddc::config::CollectionArgs;
use ddc::constants::VERSION;
use ddc::utils::archive::create_tar_gz;

/// Where a node's pipeline should break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    /// Every call to the node fails
    Unreachable,
    CopyConfig,
    Collect,
    Transfer,
    /// The copy reports success but nothing arrives locally
    GhostTransfer,
}

pub struct FakeCluster {
    root: TempDir,
    failures: HashMap<String, FailAt>,
    transfer_delay: Duration,
    streams: Mutex<Vec<(String, Vec<String>)>>,
    active_transfers: AtomicUsize,
    max_transfers: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("temp dir"),
            failures: HashMap::new(),
            transfer_delay: Duration::ZERO,
            streams: Mutex::new(Vec::new()),
            active_transfers: AtomicUsize::new(0),
            max_transfers: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, host: &str, at: FailAt) -> Self {
        self.failures.insert(host.to_string(), at);
        self
    }

    pub fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = delay;
        self
    }

    /// The hostname a node reports, distinct from its connection id
    pub fn hostname_of(host: &str) -> String {
        format!("{}.cluster.local", host)
    }

    /// Local directory standing in for `remote` on `host`
    pub fn node_path(&self, host: &str, remote: &str) -> PathBuf {
        self.root.path().join(host).join(remote.trim_start_matches('/'))
    }

    /// Agent command lines streamed per host
    pub fn streamed_commands(&self) -> Vec<(String, Vec<String>)> {
        self.streams.lock().unwrap().clone()
    }

    pub fn max_concurrent_transfers(&self) -> usize {
        self.max_transfers.load(Ordering::SeqCst)
    }

    fn check(&self, host: &str, step: FailAt) -> Result<()> {
        match self.failures.get(host) {
            Some(FailAt::Unreachable) => Err(anyhow!("connection to {} refused", host)),
            Some(at) if *at == step => Err(anyhow!("injected {:?} failure on {}", step, host)),
            _ => Ok(()),
        }
    }

    fn run_agent(&self, host: &str, args: &[String], output: &mut dyn FnMut(&str)) -> Result<()> {
        let start = args
            .iter()
            .position(|a| a == "local-collect")
            .ok_or_else(|| anyhow!("unknown command {:?}", args))?;
        let agent = &args[start - 1];
        if !self.node_path(host, agent).is_file() {
            return Err(anyhow!("{}: no such file", agent));
        }

        let out_dir = args
            .iter()
            .position(|a| a == "--tarball-out-dir")
            .and_then(|i| args.get(i + 1))
            .ok_or_else(|| anyhow!("missing --tarball-out-dir"))?;
        if !self.node_path(host, &format!("{}/ddc.yaml", out_dir)).is_file() {
            return Err(anyhow!("ddc.yaml missing on {}", host));
        }

        output("INFO collecting logs");
        output("INFO collecting configuration");
        if let Err(e) = self.check(host, FailAt::Collect) {
            output("ERROR unable to read server.log: permission denied");
            return Err(e);
        }

        let hostname = Self::hostname_of(host);
        let payload = TempDir::new()?;
        let node_dir = payload.path().join(&hostname);
        fs::create_dir_all(node_dir.join("logs"))?;
        fs::write(node_dir.join("logs/server.log"), format!("server log of {}\n", hostname))?;
        fs::write(
            node_dir.join("cluster-stats.json"),
            format!(
                r#"{{"NodeName":"{}","DremioVersion":"25.0.0","ClusterID":"cluster-1"}}"#,
                hostname
            ),
        )?;

        let tarball = self.node_path(host, &format!("{}/{}.tar.gz", out_dir, hostname));
        create_tar_gz(payload.path(), fs::File::create(&tarball)?)?;
        output("INFO tarball written");
        Ok(())
    }
}

impl Collector for FakeCluster {
    fn name(&self) -> String {
        "fake".to_string()
    }

    fn help_text(&self) -> String {
        "fake cluster".to_string()
    }

    fn copy_to_host(&self, host: &str, source: &Path, dest: &str) -> Result<String> {
        self.check(host, FailAt::Unreachable)?;
        if dest.ends_with("ddc.yaml") {
            self.check(host, FailAt::CopyConfig)?;
        }
        let target = self.node_path(host, dest);
        fs::copy(source, &target).context(format!("scp to {}:{}", host, dest))?;
        Ok(String::new())
    }

    fn copy_from_host(&self, host: &str, source: &str, dest: &Path) -> Result<String> {
        self.check(host, FailAt::Transfer)?;

        let active = self.active_transfers.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_transfers.fetch_max(active, Ordering::SeqCst);
        thread::sleep(self.transfer_delay);
        let result = if self.failures.get(host) == Some(&FailAt::GhostTransfer) {
            Ok(0)
        } else {
            fs::copy(self.node_path(host, source), dest).context(format!("scp from {}:{}", host, source))
        };
        self.active_transfers.fetch_sub(1, Ordering::SeqCst);

        result.map(|bytes| format!("{} bytes", bytes))
    }

    fn execute(&self, host: &str, args: &[String]) -> Result<String> {
        self.check(host, FailAt::Unreachable)?;
        let strs: Vec<&str> = args.iter().map(String::as_str).collect();
        match strs.as_slice() {
            ["mkdir", "-p", dir] => {
                fs::create_dir_all(self.node_path(host, dir))?;
                Ok(String::new())
            }
            ["chmod", "+x", path] => {
                if self.node_path(host, path).is_file() {
                    Ok(String::new())
                } else {
                    Err(anyhow!("chmod: {}: no such file", path))
                }
            }
            ["rm", "-f", path] => {
                let _ = fs::remove_file(self.node_path(host, path));
                Ok(String::new())
            }
            ["hostname"] => Ok(format!("{}\n", Self::hostname_of(host))),
            [agent, "version"] => {
                if self.node_path(host, agent).is_file() {
                    Ok(format!("ddc v{}\n", VERSION))
                } else {
                    Err(anyhow!("{}: not found", agent))
                }
            }
            _ => Err(anyhow!("unexpected command {:?}", args)),
        }
    }

    fn execute_and_stream(&self, host: &str, output: &mut dyn FnMut(&str), args: &[String]) -> Result<()> {
        self.check(host, FailAt::Unreachable)?;
        self.streams.lock().unwrap().push((host.to_string(), args.to_vec()));
        self.run_agent(host, args, output)
    }

    fn discover_hosts(&self, selector: &str) -> Result<Vec<String>> {
        Ok(selector
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| {
                let _ = fs::create_dir_all(self.root.path().join(h));
                h.to_string()
            })
            .collect())
    }
}

/// Agent, agent config and output location for one run
pub struct RunFixture {
    pub dir: TempDir,
    pub args: CollectionArgs,
}

impl RunFixture {
    pub fn new(coordinators: &str, executors: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let agent = dir.path().join("ddc-agent");
        let config = dir.path().join("ddc.yaml");
        fs::write(&agent, b"#!/bin/sh\nexit 0\n").expect("agent");
        fs::write(&config, b"collect-mode: light\n").expect("config");

        let args = CollectionArgs {
            coordinator_selector: coordinators.to_string(),
            executor_selector: executors.to_string(),
            dremio_pat_token: Some("pat-secret".to_string()),
            local_agent_path: agent,
            local_config_path: config,
            output_file: dir.path().join("out").join("diag.tgz"),
            disable_console_status: true,
            ..Default::default()
        };
        Self { dir, args }
    }

    pub fn output(&self) -> &Path {
        &self.args.output_file
    }
}
