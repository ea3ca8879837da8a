use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::debug;
use ssh2::{ExtendedData, Session};

use crate::collectors::collector::{shell_join, Collector};
use crate::constants::{DEFAULT_CONNECTION_TIMEOUT_SECS, SSH_DEFAULT_PORT};
use crate::security::mask_command;

/// Connection settings for the SSH backend
#[derive(Clone, Debug)]
pub struct SshConfig {
    pub username: String,
    pub private_key_path: PathBuf,
    pub port: u16,
    pub connection_timeout_sec: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            private_key_path: PathBuf::new(),
            port: SSH_DEFAULT_PORT,
            connection_timeout_sec: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }
}

/// Reaches nodes over SSH, opening one session per remote action.
pub struct SshCollector {
    config: SshConfig,
}

impl SshCollector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Create a new authenticated SSH session to `host`
    fn create_session(&self, host: &str) -> Result<Session> {
        let tcp = TcpStream::connect(format!("{}:{}", host, self.config.port))
            .context(format!("Failed to connect to {}:{}", host, self.config.port))?;

        let timeout = Duration::from_secs(self.config.connection_timeout_sec);
        let mut session = Session::new().context("Failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
        session.handshake().context("Failed to perform SSH handshake")?;

        session
            .userauth_pubkey_file(&self.config.username, None, &self.config.private_key_path, None)
            .context(format!(
                "Failed to authenticate as {} with key {}",
                self.config.username,
                self.config.private_key_path.display()
            ))?;

        if !session.authenticated() {
            return Err(anyhow!("Authentication failed for {}@{}", self.config.username, host));
        }
        // the agent can stay silent for minutes; only connection setup is bounded
        session.set_timeout(0);
        Ok(session)
    }

    fn run(&self, host: &str, args: &[String], output: &mut dyn FnMut(&str)) -> Result<()> {
        debug!("ssh {}@{} {}", self.config.username, host, mask_command(args));

        let session = self.create_session(host)?;
        let mut channel = session.channel_session().context("Failed to open SSH channel")?;
        channel
            .handle_extended_data(ExtendedData::Merge)
            .context("Failed to merge stderr into stdout")?;
        channel.exec(&shell_join(args)).context("Failed to start remote command")?;

        {
            let reader = BufReader::new(&mut channel);
            for line in reader.lines() {
                let line = line.context("Failed to read remote output")?;
                output(&line);
            }
        }

        channel.wait_close().context("Failed to close SSH channel")?;
        let status = channel.exit_status().context("Failed to read remote exit status")?;
        if status != 0 {
            return Err(anyhow!("remote command on {} exited with status {}", host, status));
        }
        Ok(())
    }
}

impl Collector for SshCollector {
    fn name(&self) -> String {
        "ssh".to_string()
    }

    fn help_text(&self) -> String {
        format!(
            "make sure {} can log in with key {} on port {} and that the hosts are reachable",
            self.config.username,
            self.config.private_key_path.display(),
            self.config.port
        )
    }

    fn copy_to_host(&self, host: &str, source: &Path, dest: &str) -> Result<String> {
        let metadata = fs::metadata(source)
            .context(format!("Failed to get metadata for {}", source.display()))?;
        let mut local = fs::File::open(source).context(format!("Failed to open {}", source.display()))?;

        let session = self.create_session(host)?;
        let mut remote = session
            .scp_send(Path::new(dest), 0o644, metadata.len(), None)
            .context(format!("Failed to open {}:{} for writing", host, dest))?;

        let copied = io::copy(&mut local, &mut remote).context(format!("Failed to send {} to {}", source.display(), host))?;

        remote.send_eof()?;
        remote.wait_eof()?;
        remote.close()?;
        remote.wait_close()?;

        Ok(format!("copied {} bytes to {}:{}", copied, host, dest))
    }

    fn copy_from_host(&self, host: &str, source: &str, dest: &Path) -> Result<String> {
        let session = self.create_session(host)?;
        let (mut remote, stat) = session
            .scp_recv(Path::new(source))
            .context(format!("Failed to open {}:{} for reading", host, source))?;

        let mut local = fs::File::create(dest).context(format!("Failed to create {}", dest.display()))?;
        let copied = io::copy(&mut (&mut remote).take(stat.size()), &mut local)
            .context(format!("Failed to receive {} from {}", source, host))?;

        remote.send_eof()?;
        remote.wait_eof()?;
        remote.close()?;
        remote.wait_close()?;

        Ok(format!("copied {} bytes from {}:{}", copied, host, source))
    }

    fn execute(&self, host: &str, args: &[String]) -> Result<String> {
        let mut combined = String::new();
        let result = self.run(host, args, &mut |line| {
            combined.push_str(line);
            combined.push('\n');
        });
        match result {
            Ok(()) => Ok(combined),
            Err(e) => Err(e.context(combined.trim().to_string())),
        }
    }

    fn execute_and_stream(&self, host: &str, output: &mut dyn FnMut(&str), args: &[String]) -> Result<()> {
        self.run(host, args, output)
    }

    /// A comma separated list of hosts; blanks are dropped.
    fn discover_hosts(&self, selector: &str) -> Result<Vec<String>> {
        Ok(parse_host_list(selector))
    }
}

pub fn parse_host_list(selector: &str) -> Vec<String> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}
