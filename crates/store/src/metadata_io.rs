//! `metadata.json` I/O for cache entries

use chrono::{DateTime, Utc};
use devnet_errors::{CacheError, Error};
use devnet_types::ConfigHash;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Build facts recorded beside each cached binary
///
/// The binary itself stays the source of truth for validity; this file only
/// carries what cannot be recovered from it (the requested ref, build time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub commit_hash: String,
    pub config_hash: ConfigHash,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub build_time: DateTime<Utc>,
    pub size_bytes: u64,
    pub network_type: String,
}

/// Read an entry's `metadata.json`
///
/// # Errors
/// Returns an error if the file cannot be read or does not parse.
pub async fn read_entry_metadata(path: &Path) -> Result<EntryMetadata, Error> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    serde_json::from_str(&content).map_err(|e| {
        CacheError::CorruptedMetadata {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Write an entry's `metadata.json` atomically
///
/// # Errors
/// Returns an error if serialization or writing fails.
pub async fn write_entry_metadata(path: &Path, metadata: &EntryMetadata) -> Result<(), Error> {
    let content = serde_json::to_vec_pretty(metadata)?;
    devnet_platform::fs::write_atomic(path, &content).await
}
