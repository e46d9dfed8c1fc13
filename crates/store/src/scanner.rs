//! Read-only discovery of cached binaries
//!
//! The scanner never runs a binary. Entries that do not look like cache
//! entries are reported in `ScanReport::skipped` and left for the caller to
//! log; a single bad entry never fails the scan.

use chrono::{DateTime, Utc};
use devnet_config::constants::CACHE_METADATA_FILE;
use devnet_errors::Error;
use devnet_types::{is_valid_cache_key, CacheKey, CachedBinaryMetadata};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::metadata_io::read_entry_metadata;

/// A directory entry the scanner ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning one or more network directories
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub binaries: Vec<CachedBinaryMetadata>,
    pub skipped: Vec<SkippedEntry>,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.binaries.extend(other.binaries);
        self.skipped.extend(other.skipped);
    }
}

/// Scan `cache_dir/{network_type}` for entries holding `binary_name`
///
/// A missing network directory yields an empty report.
///
/// # Errors
/// Returns `Error::Cancelled` if `cancel` fires, or an error if the network
/// directory exists but cannot be listed.
pub async fn scan_cached_binaries(
    cancel: &CancellationToken,
    cache_dir: &Path,
    network_type: &str,
    binary_name: &str,
) -> Result<ScanReport, Error> {
    let network_dir = cache_dir.join(network_type);
    let mut report = ScanReport::default();

    let mut entries = match fs::read_dir(&network_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(Error::io_with_path(&e, &network_dir)),
    };

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(Error::io_with_path(&e, &network_dir)),
        };

        let path = entry.path();
        match scan_entry(&path, network_type, binary_name).await {
            Ok(metadata) => report.binaries.push(metadata),
            Err(reason) => report.skipped.push(SkippedEntry { path, reason }),
        }
    }

    Ok(report)
}

/// Scan every network directory under `cache_dir`
///
/// Used when the target network is unknown or its own directory is empty.
///
/// # Errors
/// Returns `Error::Cancelled` if `cancel` fires, or an error if `cache_dir`
/// exists but cannot be listed.
pub async fn scan_all_networks(
    cancel: &CancellationToken,
    cache_dir: &Path,
    binary_name: &str,
) -> Result<ScanReport, Error> {
    let mut report = ScanReport::default();

    let mut entries = match fs::read_dir(cache_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(Error::io_with_path(&e, cache_dir)),
    };

    let mut networks = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io_with_path(&e, cache_dir))?
    {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        if is_dir {
            networks.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    networks.sort();

    for network in networks {
        let network_report = scan_cached_binaries(cancel, cache_dir, &network, binary_name).await?;
        report.merge(network_report);
    }

    Ok(report)
}

async fn scan_entry(
    entry_dir: &Path,
    network_type: &str,
    binary_name: &str,
) -> Result<CachedBinaryMetadata, String> {
    let name = entry_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !is_valid_cache_key(&name) {
        return Err("not a cache key".to_string());
    }
    let key = CacheKey::parse(&name).map_err(|e| e.to_string())?;

    let entry_meta = fs::metadata(entry_dir)
        .await
        .map_err(|e| format!("unreadable entry: {e}"))?;
    if !entry_meta.is_dir() {
        return Err("not a directory".to_string());
    }

    let binary_path = entry_dir.join(binary_name);
    let binary_meta = fs::metadata(&binary_path)
        .await
        .map_err(|_| format!("missing binary {binary_name}"))?;
    if !binary_meta.is_file() {
        return Err(format!("{binary_name} is not a regular file"));
    }

    let mod_time: DateTime<Utc> = binary_meta
        .modified()
        .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);

    let (git_ref, build_time) =
        match read_entry_metadata(&entry_dir.join(CACHE_METADATA_FILE)).await {
            Ok(recorded) if recorded.commit_hash.eq_ignore_ascii_case(key.commit_hash()) => {
                (recorded.git_ref, recorded.build_time)
            }
            Ok(_) => return Err("metadata.json names a different commit".to_string()),
            Err(e) => {
                tracing::debug!(entry = %entry_dir.display(), error = %e, "using default entry metadata");
                (key.commit_hash_short().to_string(), mod_time)
            }
        };

    Ok(CachedBinaryMetadata::new(
        network_type,
        &key,
        git_ref,
        build_time,
        binary_meta.len(),
        binary_path,
        mod_time,
    ))
}
