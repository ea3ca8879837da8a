//! Test utilities for ddc
//!
//! Helpers shared by the unit test modules: temp files, small tarballs and a
//! collector that records every remote call.

#![cfg(test)]

use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use crate::collectors::collector::Collector;
use crate::utils::archive::create_tar_gz;

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Writes `files` (relative path, content) under `root`
pub fn create_test_tree(root: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

/// Builds `<dir>/<name>` as a tar.gz holding `files`
pub fn create_test_tarball(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> Result<PathBuf> {
    let content = TempDir::new()?;
    create_test_tree(content.path(), files)?;

    let path = dir.join(name);
    create_tar_gz(content.path(), fs::File::create(&path)?)?;
    Ok(path)
}

/// Collector that logs every call and can be told to fail.
///
/// Any call whose rendering contains `fail_on` returns an error.
/// `copy_from_host` copies `tarball` to the requested destination.
pub struct RecordingCollector {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    tarball: Option<PathBuf>,
    hostname: Option<String>,
    agent_version: String,
    echo_args: bool,
}

impl RecordingCollector {
    pub fn new(tarball: Option<PathBuf>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            tarball,
            hostname: Some("node-1".to_string()),
            agent_version: "ddc v0.0.0".to_string(),
            echo_args: false,
        }
    }

    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_on = Some(pattern.to_string());
        self
    }

    /// `None` makes the `hostname` command fail
    pub fn with_hostname(mut self, hostname: Option<&str>) -> Self {
        self.hostname = hostname.map(str::to_string);
        self
    }

    pub fn with_agent_version(mut self, version: &str) -> Self {
        self.agent_version = version.to_string();
        self
    }

    /// The streamed agent prints its own arguments, then fails
    pub fn echoing_args(mut self) -> Self {
        self.echo_args = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        match &self.fail_on {
            Some(pattern) if call.contains(pattern.as_str()) => Err(anyhow!("injected failure: {}", call)),
            _ => Ok(()),
        }
    }
}

impl Collector for RecordingCollector {
    fn name(&self) -> String {
        "recording".to_string()
    }

    fn help_text(&self) -> String {
        "test collector".to_string()
    }

    fn copy_to_host(&self, host: &str, source: &Path, dest: &str) -> Result<String> {
        self.record(format!("copy-to {} {} {}", host, source.display(), dest))?;
        Ok(String::new())
    }

    fn copy_from_host(&self, host: &str, source: &str, dest: &Path) -> Result<String> {
        self.record(format!("copy-from {} {}", host, source))?;
        match &self.tarball {
            Some(tarball) => {
                fs::copy(tarball, dest)?;
                Ok(String::new())
            }
            None => Err(anyhow!("no such file {}", source)),
        }
    }

    fn execute(&self, host: &str, args: &[String]) -> Result<String> {
        self.record(format!("exec {} {}", host, args.join(" ")))?;
        match args {
            [cmd] if cmd == "hostname" => self
                .hostname
                .clone()
                .ok_or_else(|| anyhow!("hostname: command not found")),
            [_, sub] if sub == "version" => Ok(self.agent_version.clone()),
            _ => Ok(String::new()),
        }
    }

    fn execute_and_stream(&self, host: &str, output: &mut dyn FnMut(&str), args: &[String]) -> Result<()> {
        output("starting local collection");
        if self.echo_args {
            output(&format!("fatal: bad invocation: {}", args.join(" ")));
            if let Some(last) = args.last() {
                output(&format!("rejected credential {}", last));
            }
            self.record(format!("stream {} {}", host, args.join(" ")))?;
            return Err(anyhow!("agent exited with status 2: {}", args.join(" ")));
        }
        let result = self.record(format!("stream {} {}", host, args.join(" ")));
        output("collection step finished");
        result
    }

    fn discover_hosts(&self, selector: &str) -> Result<Vec<String>> {
        Ok(selector
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect())
    }
}
