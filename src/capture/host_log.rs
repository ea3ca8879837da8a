use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::security::scrub_credentials;

/// Per-node log sink for streamed agent output.
///
/// Lines are scrubbed of credentials, written to `<dir>/<host>.log` and
/// mirrored at debug level. A write failure disables the file but never
/// the capture.
pub struct HostLog {
    host: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl HostLog {
    pub fn create(dir: &Path, host: &str) -> Result<Self> {
        fs::create_dir_all(dir).context(format!("Failed to create log directory {}", dir.display()))?;
        let path = dir.join(format!("{}.log", sanitize_host(host)));
        let file = File::create(&path).context(format!("Failed to create host log {}", path.display()))?;

        Ok(Self {
            host: host.to_string(),
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// A sink that only mirrors to the application log
    pub fn disabled(host: &str) -> Self {
        Self {
            host: host.to_string(),
            path: PathBuf::new(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&mut self, line: &str) {
        let line = scrub_credentials(line);
        debug!("{} - {}", self.host, line);

        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writeln!(writer, "{}", line) {
                warn!("disabling host log {}: {}", self.path.display(), e);
                self.writer = None;
            }
        }
    }
}

impl Drop for HostLog {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

/// Host identifiers can contain ':' (IPv6) or '/' (pod/name); keep file names flat.
fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lines_written_and_scrubbed() {
        let dir = TempDir::new().unwrap();
        {
            let mut log = HostLog::create(dir.path(), "10.0.0.5").unwrap();
            log.write_line("starting collection");
            log.write_line("using --dremio-pat-token abc123");
        }

        let content = fs::read_to_string(dir.path().join("10.0.0.5.log")).unwrap();
        assert!(content.contains("starting collection"));
        assert!(!content.contains("abc123"));
    }

    #[test]
    fn test_sanitize_host() {
        assert_eq!(sanitize_host("pod/dremio-0"), "pod_dremio-0");
        assert_eq!(sanitize_host("fe80::1"), "fe80__1");
    }

    #[test]
    fn test_disabled_sink_accepts_lines() {
        let mut log = HostLog::disabled("node");
        log.write_line("ignored");
        assert_eq!(log.path(), Path::new(""));
    }
}
