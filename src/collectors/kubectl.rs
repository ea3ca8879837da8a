use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::collectors::collector::Collector;
use crate::collectors::process::{run_capture, run_streaming};
use crate::security::mask_command;

/// Prefix of the line carrying the remote shell's pid
const PID_MARKER: &str = "ddc-remote-pid:";

/// Settings for the kubectl backend
#[derive(Clone, Debug)]
pub struct KubectlConfig {
    pub kubectl_path: String,
    pub namespace: String,
    pub container: Option<String>,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            kubectl_path: "kubectl".to_string(),
            namespace: "default".to_string(),
            container: None,
        }
    }
}

/// Reaches pods by shelling out to `kubectl`.
pub struct KubectlCollector {
    config: KubectlConfig,
    pids: Mutex<HashMap<String, String>>,
}

impl KubectlCollector {
    pub fn new(config: KubectlConfig) -> Self {
        Self {
            config,
            pids: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &KubectlConfig {
        &self.config
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.config.kubectl_path);
        cmd.arg("-n").arg(&self.config.namespace);
        cmd
    }

    /// `kubectl exec` prefix for a pod, up to and including `--`
    pub fn exec_args(&self, pod: &str) -> Vec<String> {
        let mut args = vec!["-n".to_string(), self.config.namespace.clone(), "exec".to_string()];
        if let Some(container) = &self.config.container {
            args.push("-c".to_string());
            args.push(container.clone());
        }
        args.push(pod.to_string());
        args.push("--".to_string());
        args
    }

    fn exec_command(&self, pod: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.kubectl_path);
        cmd.args(self.exec_args(pod)).args(args);
        debug!("kubectl exec {} -- {}", pod, mask_command(args));
        cmd
    }

    fn cp_command(&self, from: &str, to: &str) -> Command {
        let mut cmd = self.base_command();
        cmd.arg("cp");
        if let Some(container) = &self.config.container {
            cmd.arg("-c").arg(container);
        }
        cmd.arg(from).arg(to);
        cmd
    }

    /// `kubectl get <resource> -o yaml` for the whole namespace
    pub fn get_resource(&self, resource: &str) -> Result<String> {
        let mut cmd = self.base_command();
        cmd.args(["get", resource, "-o", "yaml"]);
        run_capture(cmd)
    }
}

impl Collector for KubectlCollector {
    fn name(&self) -> String {
        "kubectl".to_string()
    }

    fn help_text(&self) -> String {
        format!(
            "make sure '{}' is on the PATH, the current context can reach namespace '{}' and the label selectors match running pods",
            self.config.kubectl_path, self.config.namespace
        )
    }

    fn copy_to_host(&self, host: &str, source: &Path, dest: &str) -> Result<String> {
        let local = source.to_string_lossy();
        run_capture(self.cp_command(&local, &format!("{}:{}", host, dest)))
    }

    fn copy_from_host(&self, host: &str, source: &str, dest: &Path) -> Result<String> {
        let local = dest.to_string_lossy();
        run_capture(self.cp_command(&format!("{}:{}", host, source), &local))
    }

    fn execute(&self, host: &str, args: &[String]) -> Result<String> {
        run_capture(self.exec_command(host, args))
    }

    /// The remote shell reports its pid first so an interrupted run can kill
    /// the agent; that line is recorded and not forwarded.
    fn execute_and_stream(&self, host: &str, output: &mut dyn FnMut(&str), args: &[String]) -> Result<()> {
        let mut wrapped = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("echo \"{}$$\"; exec \"$@\"", PID_MARKER),
            "sh".to_string(),
        ];
        wrapped.extend_from_slice(args);

        let result = run_streaming(self.exec_command(host, &wrapped), &mut |line| match line.strip_prefix(PID_MARKER) {
            Some(pid) => self.set_host_pid(host, pid.trim()),
            None => output(line),
        });

        // the process is gone either way
        self.pids.lock().unwrap_or_else(|e| e.into_inner()).remove(host);
        result
    }

    /// Pods matching the label selector, sorted by name.
    fn discover_hosts(&self, selector: &str) -> Result<Vec<String>> {
        if selector.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = self.base_command();
        cmd.args(["get", "pods", "-l", selector, "-o", "name"]);
        let output = run_capture(cmd).map_err(|e| anyhow!("unable to list pods for '{}': {}", selector, e))?;
        Ok(parse_pod_names(&output))
    }

    fn set_host_pid(&self, host: &str, pid: &str) {
        let mut pids = self.pids.lock().unwrap_or_else(|e| e.into_inner());
        pids.insert(host.to_string(), pid.to_string());
    }

    fn cleanup_remote(&self) -> Result<()> {
        let pids: Vec<(String, String)> = {
            let mut pids = self.pids.lock().unwrap_or_else(|e| e.into_inner());
            pids.drain().collect()
        };

        for (pod, pid) in pids {
            info!("killing remote process {} on {}", pid, pod);
            let args = vec!["kill".to_string(), "-9".to_string(), pid.clone()];
            if let Err(e) = self.execute(&pod, &args) {
                warn!("unable to kill process {} on {}: {}", pid, pod, e);
            }
        }
        Ok(())
    }
}

pub fn parse_pod_names(output: &str) -> Vec<String> {
    let mut pods: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.strip_prefix("pod/").unwrap_or(l).to_string())
        .collect();
    pods.sort();
    pods
}
