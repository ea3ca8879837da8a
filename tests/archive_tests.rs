//! Final archive assembly against a realistic staging tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use tempfile::TempDir;
use walkdir::WalkDir;

use ddc::models::SummaryInfo;
use ddc::utils::archive::{extract_tar_gz, Archiver, TarGzArchiver};

fn files_under(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().to_string();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_every_staged_file_survives_archiving() -> Result<()> {
    let staging = TempDir::new()?;
    let root = staging.path();
    fs::create_dir_all(root.join("node-1/logs/archive"))?;
    fs::create_dir_all(root.join("node-2/jfr"))?;
    fs::create_dir_all(root.join("empty-dir"))?;
    fs::write(root.join("node-1/logs/server.log"), "line 1\nline 2\n")?;
    fs::write(root.join("node-1/logs/archive/server.2024-01-01.log.gz"), [0x1f, 0x8b, 0, 1, 2, 3])?;
    fs::write(root.join("node-2/jfr/recording.jfr"), (0..=255u8).cycle().take(100_000).collect::<Vec<_>>())?;
    fs::write(root.join("node-2/cluster-stats.json"), r#"{"NodeName":"node-2"}"#)?;

    let before = files_under(root);

    let out = TempDir::new()?;
    let archive = TarGzArchiver.archive(root, &SummaryInfo::new(Utc::now()), &out.path().join("diag.tgz"))?;

    let extracted = TempDir::new()?;
    extract_tar_gz(&archive, extracted.path())?;
    let after = files_under(extracted.path());

    for (path, content) in &before {
        assert_eq!(after.get(path), Some(content), "{} changed or went missing", path);
    }
    assert!(after.contains_key("summary.json"));
    assert!(after.contains_key("completed"));
    assert!(extracted.path().join("empty-dir").is_dir());
    Ok(())
}

#[test]
fn test_existing_output_is_replaced_whole() -> Result<()> {
    let staging = TempDir::new()?;
    fs::write(staging.path().join("a.txt"), "fresh")?;
    let out = TempDir::new()?;
    let output = out.path().join("diag.tgz");
    fs::write(&output, "stale archive from an earlier run")?;

    let archive = TarGzArchiver.archive(staging.path(), &SummaryInfo::new(Utc::now()), &output)?;

    let extracted = TempDir::new()?;
    extract_tar_gz(&archive, extracted.path())?;
    assert_eq!(fs::read_to_string(extracted.path().join("a.txt"))?, "fresh");
    Ok(())
}
