use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Backend, CollectionArgs};

/// Command-line arguments for ddc.
///
/// Every collection flag is optional and, when given, overrides the value
/// loaded from the YAML file passed with `--config`.
#[derive(Parser, Debug)]
#[clap(name = "ddc", about = "Collect diagnostics from every coordinator and executor of a cluster")]
pub struct Args {
    /// Path to the run configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Backend used to reach the nodes
    #[clap(long)]
    pub backend: Option<BackendArg>,

    /// Coordinators: comma separated hosts (ssh) or a pod label selector (kubectl)
    #[clap(long)]
    pub coordinator: Option<String>,

    /// Executors: comma separated hosts (ssh) or a pod label selector (kubectl)
    #[clap(long)]
    pub executor: Option<String>,

    /// Kubernetes namespace
    #[clap(short, long)]
    pub namespace: Option<String>,

    /// Container inside each pod
    #[clap(long)]
    pub container: Option<String>,

    /// SSH user
    #[clap(long)]
    pub ssh_user: Option<String>,

    /// Private key for SSH authentication
    #[clap(long)]
    pub ssh_key: Option<PathBuf>,

    /// SSH port
    #[clap(long)]
    pub ssh_port: Option<u16>,

    /// Run the remote agent as this user
    #[clap(long)]
    pub sudo_user: Option<String>,

    /// Working directory on every node
    #[clap(long)]
    pub transfer_dir: Option<String>,

    /// Simultaneous tarball transfers back to this machine
    #[clap(long)]
    pub transfer_threads: Option<usize>,

    /// Agent binary pushed to every node
    #[clap(long)]
    pub agent: Option<PathBuf>,

    /// Agent configuration (ddc.yaml) pushed to every node
    #[clap(long)]
    pub agent_config: Option<PathBuf>,

    /// Final archive path
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Collection mode label handed to the agent (light, standard, health-check)
    #[clap(long)]
    pub collection_mode: Option<String>,

    /// Never let the agent query the REST API, even on coordinators
    #[clap(long)]
    pub disable_rest_api: bool,

    /// Do not redraw the live status block
    #[clap(long)]
    pub no_console_status: bool,

    /// Application log file (default: ddc.log next to the output archive)
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum BackendArg {
    Ssh,
    Kubectl,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Ssh => Backend::Ssh,
            BackendArg::Kubectl => Backend::Kubectl,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the ddc version
    Version,

    /// Write a run configuration with default values
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "ddc-run.yaml")]
        path: PathBuf,
    },
}

impl Args {
    /// Overlay every flag that was given onto `args`
    pub fn apply_to(&self, args: &mut CollectionArgs) {
        if let Some(backend) = &self.backend {
            args.backend = backend.clone().into();
        }
        if let Some(v) = &self.coordinator {
            args.coordinator_selector = v.clone();
        }
        if let Some(v) = &self.executor {
            args.executor_selector = v.clone();
        }
        if let Some(v) = &self.namespace {
            args.namespace = v.clone();
        }
        if let Some(v) = &self.container {
            args.container = Some(v.clone());
        }
        if let Some(v) = &self.ssh_user {
            args.ssh_user = Some(v.clone());
        }
        if let Some(v) = &self.ssh_key {
            args.ssh_key = Some(v.clone());
        }
        if let Some(v) = self.ssh_port {
            args.ssh_port = v;
        }
        if let Some(v) = &self.sudo_user {
            args.sudo_user = Some(v.clone());
        }
        if let Some(v) = &self.transfer_dir {
            args.transfer_dir = v.clone();
        }
        if let Some(v) = self.transfer_threads {
            args.transfer_threads = v;
        }
        if let Some(v) = &self.agent {
            args.local_agent_path = v.clone();
        }
        if let Some(v) = &self.agent_config {
            args.local_config_path = v.clone();
        }
        if let Some(v) = &self.output {
            args.output_file = v.clone();
        }
        if let Some(v) = &self.collection_mode {
            args.collection_mode = v.clone();
        }
        if self.disable_rest_api {
            args.disable_rest_api = true;
        }
        if self.no_console_status {
            args.disable_console_status = true;
        }
    }
}
