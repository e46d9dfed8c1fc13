//! Types for operations and results

use devnet_types::{ActiveSymlink, CachedBinaryMetadata, ExecutionMode};
use serde::Serialize;
use std::path::PathBuf;

/// Snapshot of a devnet and its active binary
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub home: PathBuf,
    /// `None` when no devnet metadata exists yet
    pub devnet: Option<DevnetSummary>,
    pub active: Option<ActiveSymlink>,
    /// The pointer location holds a regular file that has not been migrated
    pub plain_binary: bool,
    pub height: Option<u64>,
    /// Why the height could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_error: Option<String>,
    pub nodes: Vec<NodeStatus>,
    pub cached_binaries: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct DevnetSummary {
    pub chain_id: String,
    pub network_type: String,
    pub binary_name: String,
    pub execution_mode: ExecutionMode,
    pub current_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NodeStatus {
    pub name: String,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Cache listing, optionally validated
#[derive(Clone, Debug, Serialize)]
pub struct CacheListing {
    pub cache_dir: PathBuf,
    pub binaries: Vec<CachedBinaryMetadata>,
    pub skipped: usize,
    /// Whether `is_valid` reflects a fresh validation run
    pub validated: bool,
    /// Commit of the active binary, for marking it in listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_commit: Option<String>,
}

/// Binary to import into the cache
#[derive(Clone, Debug)]
pub struct ImportRequest {
    pub path: PathBuf,
    pub commit_hash: String,
    pub git_ref: String,
    /// Build settings the binary was produced with, hashed into the key
    pub build_settings: Vec<(String, String)>,
}

/// Result of a cache mutation
#[derive(Clone, Debug, Serialize)]
pub struct CacheChange {
    pub operation: String,
    pub cache_keys: Vec<String>,
    pub summary: String,
}
