//! Binary cache events: scanning, validation, selection and activation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    /// Scan of one network directory (or all of them) started
    ScanStarted {
        network_type: Option<String>,
        cache_dir: PathBuf,
    },

    /// A directory entry was skipped because it is not a usable cache entry
    EntrySkipped { path: PathBuf, reason: String },

    ScanCompleted { found: usize, skipped: usize },

    /// No candidates for the target network; scanning every network instead
    ScanFallbackAllNetworks { network_type: String },

    ValidationStarted { candidates: usize },

    BinaryValidated {
        commit_hash_short: String,
        version: Option<String>,
    },

    BinaryInvalid {
        commit_hash_short: String,
        reason: String,
    },

    ValidationCompleted {
        valid: usize,
        invalid: usize,
        duration: Duration,
    },

    /// The only valid candidate was chosen without prompting
    BinaryAutoSelected {
        commit_hash_short: String,
        git_ref: String,
        version: Option<String>,
    },

    BinarySelected {
        commit_hash_short: String,
        git_ref: String,
    },

    /// A binary was written into the cache
    BinaryStored {
        cache_key: String,
        path: PathBuf,
        /// False when an identical entry already existed
        created: bool,
    },

    EntryRemoved { cache_key: String },

    /// The active binary pointer now names a new target
    Activated {
        binary_name: String,
        target: PathBuf,
        previous: Option<PathBuf>,
    },

    /// A plain binary file was moved into the cache and replaced by a pointer
    Migrated {
        binary_name: String,
        cache_key: String,
    },
}
