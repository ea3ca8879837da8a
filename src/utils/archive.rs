use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use tempfile::NamedTempFile;

use crate::constants::COMPLETION_MARKER_NAME;
use crate::models::SummaryInfo;
use crate::utils::summary::write_summary;

/// Turns a finished staging tree into the single output artifact.
pub trait Archiver: Send + Sync {
    /// Write the summary into `staging_dir`, archive the tree to `output`
    /// and return the absolute path of the artifact.
    fn archive(&self, staging_dir: &Path, summary: &SummaryInfo, output: &Path) -> Result<PathBuf>;
}

/// Gzip-compressed tar archiver.
///
/// The archive is built in a temp file next to `output` and renamed into
/// place once the gzip stream is finished, so `output` never holds a
/// partial archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzArchiver;

impl Archiver for TarGzArchiver {
    fn archive(&self, staging_dir: &Path, summary: &SummaryInfo, output: &Path) -> Result<PathBuf> {
        let start = Instant::now();

        write_summary(staging_dir, summary)?;
        let marker = staging_dir.join(COMPLETION_MARKER_NAME);
        fs::write(&marker, summary.end_timestamp.to_rfc3339())
            .context(format!("Failed to write completion marker {}", marker.display()))?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).context(format!("Failed to create output directory {}", parent.display()))?;

        let temp = NamedTempFile::new_in(&parent)
            .context(format!("Failed to create temporary archive in {}", parent.display()))?;
        let file = temp.reopen().context("Failed to open temporary archive")?;
        create_tar_gz(staging_dir, file)?;

        temp.persist(output)
            .map_err(|e| e.error)
            .context(format!("Failed to move archive into place at {}", output.display()))?;

        let archive_path = fs::canonicalize(output).context(format!("Failed to resolve {}", output.display()))?;
        info!(
            "Archived {} into {} in {:?} (finished {})",
            staging_dir.display(),
            archive_path.display(),
            start.elapsed(),
            Utc::now().to_rfc3339()
        );
        Ok(archive_path)
    }
}

/// Write every entry under `source_dir` as a tar.gz stream into `out`.
///
/// Entry paths are relative to `source_dir`.
pub fn create_tar_gz(source_dir: &Path, out: File) -> Result<()> {
    let encoder = GzEncoder::new(BufWriter::new(out), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    builder
        .append_dir_all(".", source_dir)
        .context(format!("Failed to archive {}", source_dir.display()))?;

    let encoder = builder.into_inner().context("Failed to finish tar stream")?;
    let mut writer = encoder.finish().context("Failed to finish gzip stream")?;
    writer.flush().context("Failed to flush archive")?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush archive")?
        .sync_all()
        .context("Failed to sync archive to disk")?;
    Ok(())
}

/// Unpack a tar.gz archive into `dest`, returning the number of entries.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).context(format!("Failed to open {}", archive.display()))?;
    fs::create_dir_all(dest).context(format!("Failed to create {}", dest.display()))?;

    let mut tarball = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tarball.set_preserve_permissions(false);

    let mut count = 0;
    for entry in tarball
        .entries()
        .context(format!("Failed to read entries of {}", archive.display()))?
    {
        let mut entry = entry.context(format!("Corrupt entry in {}", archive.display()))?;
        // unpack_in refuses entries that would land outside dest
        let unpacked = entry
            .unpack_in(dest)
            .context(format!("Failed to unpack entry from {}", archive.display()))?;
        if unpacked {
            count += 1;
        }
    }

    debug!("Extracted {} entries from {} into {}", count, archive.display(), dest.display());
    Ok(count)
}
