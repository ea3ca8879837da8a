use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};
use tokio::runtime::Runtime;

use ddc::cli::{Args, Commands};
use ddc::collectors::{
    ClusterCollector, Collector, KubectlCollector, KubectlConfig, KubernetesResourceCollector, SshCollector, SshConfig,
};
use ddc::config::{Backend, CollectionArgs};
use ddc::constants::{APP_LOG_FILE, PAT_TOKEN_ENV, VERSION};
use ddc::orchestrator;
use ddc::stats::Stats;
use ddc::utils::archive::TarGzArchiver;
use ddc::utils::shutdown::ShutdownHooks;

fn main() -> Result<()> {
    let cli = Args::parse();

    if let Some(cmd) = &cli.command {
        return handle_subcommand(cmd);
    }

    let mut run = load_run_args(&cli)?;
    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| default_log_path(&run.output_file));
    initialize_logging(cli.verbose, &log_file)?;
    run.log_file = Some(log_file);

    info!("Starting ddc {} with the {} backend", VERSION, run.backend);
    run.validate()?;

    let (collector, cluster_collectors) = build_backend(&run);
    let hooks = Arc::new(ShutdownHooks::new());

    // Holds the Ctrl+C watcher; dropped at the end of main
    let runtime = Runtime::new().context("Failed to start signal runtime")?;
    watch_for_interrupt(&runtime, Arc::clone(&hooks), Arc::clone(&collector));

    let stats = Stats::new();
    let result = orchestrator::execute(
        Arc::clone(&collector),
        &TarGzArchiver,
        &run,
        &hooks,
        &stats,
        &cluster_collectors,
    );
    hooks.run_all();

    match result {
        Ok(report) => {
            let summary = &report.summary;
            info!(
                "Collection {} finished: {}/{} nodes contacted, {} files, {} failed, {} skipped",
                summary.collection_id,
                summary.cluster_info.number_nodes_contacted,
                summary.cluster_info.total_nodes_attempted,
                summary.collected_files.len(),
                summary.failed_files.len(),
                summary.skipped_files.len()
            );
            println!("{}", report.archive_path.display());
            Ok(())
        }
        Err(e) => {
            error!("Collection failed: {:#}", e);
            Err(e)
        }
    }
}

/// YAML first, then flags, then the token from the environment
fn load_run_args(cli: &Args) -> Result<CollectionArgs> {
    let mut run = match &cli.config {
        Some(path) => CollectionArgs::from_yaml_file(path)?,
        None => CollectionArgs::default(),
    };
    cli.apply_to(&mut run);

    if run.dremio_pat_token.is_none() {
        run.dremio_pat_token = env::var(PAT_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
    }
    Ok(run)
}

fn default_log_path(output_file: &Path) -> PathBuf {
    match output_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(APP_LOG_FILE),
        _ => PathBuf::from(APP_LOG_FILE),
    }
}

/// Terminal at the requested level, the log file always at debug
fn initialize_logging(verbose: bool, log_file: &Path) -> Result<()> {
    let term_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    if let Some(dir) = log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).context(format!("Failed to create log directory {}", dir.display()))?;
    }
    let file = File::create(log_file).context(format!("Failed to create log file {}", log_file.display()))?;

    CombinedLogger::init(vec![
        TermLogger::new(term_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug, Config::default(), file),
    ])
    .context("Failed to initialize logger")?;
    Ok(())
}

fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::Version => {
            println!("ddc {}", VERSION);
            Ok(())
        }
        Commands::InitConfig { path } => {
            CollectionArgs::default().save_to_yaml_file(path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

fn build_backend(run: &CollectionArgs) -> (Arc<dyn Collector>, Vec<Box<dyn ClusterCollector>>) {
    match run.backend {
        Backend::Ssh => {
            let ssh = SshCollector::new(SshConfig {
                username: run.ssh_user.clone().unwrap_or_default(),
                private_key_path: run.ssh_key.clone().unwrap_or_else(default_ssh_key),
                port: run.ssh_port,
                connection_timeout_sec: run.connection_timeout_secs,
            });
            let collector: Arc<dyn Collector> = Arc::new(ssh);
            (collector, Vec::new())
        }
        Backend::Kubectl => {
            let kubectl = Arc::new(KubectlCollector::new(KubectlConfig {
                kubectl_path: run.kubectl_path.clone(),
                namespace: run.namespace.clone(),
                container: run.container.clone(),
            }));
            let resources: Box<dyn ClusterCollector> = Box::new(KubernetesResourceCollector::new(Arc::clone(&kubectl)));
            let collector: Arc<dyn Collector> = kubectl;
            (collector, vec![resources])
        }
    }
}

fn default_ssh_key() -> PathBuf {
    env::var("HOME")
        .map(|home| Path::new(&home).join(".ssh").join("id_rsa"))
        .unwrap_or_else(|_| PathBuf::from(".ssh/id_rsa"))
}

/// On Ctrl+C: run the cleanup hooks, kill remote agents and exit
fn watch_for_interrupt(runtime: &Runtime, hooks: Arc<ShutdownHooks>, collector: Arc<dyn Collector>) {
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Unable to listen for Ctrl+C; interrupted runs will leave temporary files behind");
            return;
        }

        warn!("Interrupted, cleaning up");
        let cleanup = tokio::task::spawn_blocking(move || {
            hooks.run_all();
            if let Err(e) = collector.cleanup_remote() {
                warn!("Remote cleanup failed: {:#}", e);
            }
        });
        let _ = cleanup.await;
        std::process::exit(130);
    });
}
