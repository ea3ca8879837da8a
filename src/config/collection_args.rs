use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_OUTPUT_FILE, DEFAULT_TRANSFER_DIR, DEFAULT_TRANSFER_THREADS,
    REMOTE_CONFIG_NAME, REMOTE_AGENT_NAME, SSH_DEFAULT_PORT,
};
use crate::error::DdcError;

/// Remote execution backend selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ssh,
    Kubectl,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Ssh => write!(f, "ssh"),
            Backend::Kubectl => write!(f, "kubectl"),
        }
    }
}

/// Run configuration, loaded from YAML and then overridden by CLI flags.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectionArgs {
    pub backend: Backend,
    /// SSH: comma separated hosts. kubectl: pod label selector.
    pub coordinator_selector: String,
    pub executor_selector: String,

    pub namespace: String,
    pub kubectl_path: String,
    pub container: Option<String>,

    pub ssh_user: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub ssh_port: u16,
    pub connection_timeout_secs: u64,

    pub sudo_user: Option<String>,
    pub dremio_pat_token: Option<String>,

    pub transfer_dir: String,
    pub transfer_threads: usize,

    /// Agent binary pushed to every node
    pub local_agent_path: PathBuf,
    /// `ddc.yaml` pushed to every node
    pub local_config_path: PathBuf,
    pub output_file: PathBuf,

    pub collection_mode: String,
    pub disable_rest_api: bool,
    pub disable_console_status: bool,
    pub collectors_enabled: Vec<String>,
    pub collectors_disabled: Vec<String>,

    /// YAML file these arguments were read from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
    #[serde(skip)]
    pub log_file: Option<PathBuf>,
}

impl Default for CollectionArgs {
    fn default() -> Self {
        Self {
            backend: Backend::Ssh,
            coordinator_selector: String::new(),
            executor_selector: String::new(),
            namespace: "default".to_string(),
            kubectl_path: "kubectl".to_string(),
            container: None,
            ssh_user: None,
            ssh_key: None,
            ssh_port: SSH_DEFAULT_PORT,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            sudo_user: None,
            dremio_pat_token: None,
            transfer_dir: DEFAULT_TRANSFER_DIR.to_string(),
            transfer_threads: DEFAULT_TRANSFER_THREADS,
            local_agent_path: PathBuf::from(REMOTE_AGENT_NAME),
            local_config_path: PathBuf::from(REMOTE_CONFIG_NAME),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            collection_mode: "light".to_string(),
            disable_rest_api: false,
            disable_console_status: false,
            collectors_enabled: Vec::new(),
            collectors_disabled: Vec::new(),
            config_path: None,
            log_file: None,
        }
    }
}

impl fmt::Debug for CollectionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionArgs")
            .field("backend", &self.backend)
            .field("coordinator_selector", &self.coordinator_selector)
            .field("executor_selector", &self.executor_selector)
            .field("namespace", &self.namespace)
            .field("ssh_user", &self.ssh_user)
            .field("sudo_user", &self.sudo_user)
            .field("dremio_pat_token", &self.dremio_pat_token.as_ref().map(|_| "<REDACTED>"))
            .field("transfer_dir", &self.transfer_dir)
            .field("transfer_threads", &self.transfer_threads)
            .field("local_agent_path", &self.local_agent_path)
            .field("local_config_path", &self.local_config_path)
            .field("output_file", &self.output_file)
            .field("collection_mode", &self.collection_mode)
            .finish_non_exhaustive()
    }
}

impl CollectionArgs {
    /// Load arguments from a YAML file; unspecified keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let mut args: CollectionArgs = serde_yaml::from_str(&content)
            .context(format!("Failed to parse YAML config {}", path.display()))?;
        args.config_path = Some(path.to_path_buf());

        debug!("Loaded run configuration from {}", path.display());
        Ok(args)
    }

    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;
        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved run configuration to {}", path.display());
        Ok(())
    }

    /// Reject configurations that cannot start a run.
    pub fn validate(&self) -> Result<()> {
        if self.transfer_threads == 0 {
            return Err(DdcError::InvalidConfig("transfer_threads must be at least 1".to_string()).into());
        }
        if self.coordinator_selector.trim().is_empty() && self.executor_selector.trim().is_empty() {
            return Err(DdcError::InvalidConfig(
                "at least one of coordinator_selector or executor_selector must be set".to_string(),
            )
            .into());
        }
        if self.transfer_dir.trim().is_empty() {
            return Err(DdcError::InvalidConfig("transfer_dir must not be empty".to_string()).into());
        }
        if !self.local_agent_path.is_file() {
            return Err(DdcError::InvalidConfig(format!(
                "agent binary {} does not exist",
                self.local_agent_path.display()
            ))
            .into());
        }
        if !self.local_config_path.is_file() {
            return Err(DdcError::InvalidConfig(format!(
                "agent configuration {} does not exist",
                self.local_config_path.display()
            ))
            .into());
        }
        if self.backend == Backend::Ssh && self.ssh_user.is_none() {
            return Err(DdcError::InvalidConfig("ssh backend requires ssh_user".to_string()).into());
        }
        Ok(())
    }
}
