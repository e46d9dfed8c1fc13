//! Cached binary metadata, the active binary pointer and selection results

use crate::cache_key::{CacheKey, ConfigHash, SHORT_COMMIT_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One built or downloaded binary found in the cache
///
/// Everything except the validation fields is fixed when the entry is
/// created. `is_valid`, `validation_error` and `detected_version` are derived
/// by running the binary and may be recomputed on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBinaryMetadata {
    pub network_type: String,
    pub commit_hash: String,
    pub config_hash: ConfigHash,
    /// Branch, tag or commit originally requested
    pub git_ref: String,
    pub build_time: DateTime<Utc>,
    pub size_bytes: u64,
    /// Absolute path to the binary file
    pub path: PathBuf,
    pub mod_time: DateTime<Utc>,
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_version: Option<String>,
    pub commit_hash_short: String,
}

impl CachedBinaryMetadata {
    /// Create metadata for a freshly scanned entry; validation fields start unset
    #[must_use]
    pub fn new(
        network_type: impl Into<String>,
        key: &CacheKey,
        git_ref: impl Into<String>,
        build_time: DateTime<Utc>,
        size_bytes: u64,
        path: PathBuf,
        mod_time: DateTime<Utc>,
    ) -> Self {
        Self {
            network_type: network_type.into(),
            commit_hash: key.commit_hash().to_string(),
            config_hash: key.config_hash().clone(),
            git_ref: git_ref.into(),
            build_time,
            size_bytes,
            path,
            mod_time,
            is_valid: false,
            validation_error: None,
            detected_version: None,
            commit_hash_short: key.commit_hash()[..SHORT_COMMIT_LEN].to_string(),
        }
    }

    /// Cache key of this entry
    ///
    /// # Errors
    ///
    /// Returns an error if the stored commit hash is malformed.
    pub fn cache_key(&self) -> Result<CacheKey, devnet_errors::CacheError> {
        CacheKey::new(&self.commit_hash, self.config_hash.clone())
    }

    /// Human-readable label used in prompts and listings
    #[must_use]
    pub fn display_label(&self) -> String {
        let version = self.detected_version.as_deref().unwrap_or("unknown version");
        format!(
            "{} ({}) {} [{}]",
            self.git_ref,
            self.commit_hash_short,
            version,
            self.mod_time.format("%Y-%m-%d %H:%M")
        )
    }
}

/// The single pointer naming the binary nodes start with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSymlink {
    /// Location of the pointer, `bin/{binary_name}`
    pub path: PathBuf,
    /// Link target as stored, relative to the pointer's directory
    pub target: PathBuf,
    /// Commit parsed from the cache key component of the target, if any
    pub commit_hash: Option<String>,
}

/// Outcome of one binary selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinarySelectionResult {
    /// A cached binary was chosen
    Selected {
        binary: Box<CachedBinaryMetadata>,
        /// Chosen without prompting because it was the only valid candidate
        auto_selected: bool,
    },
    /// Nothing usable is cached; build the given version from source
    Build { version: String },
    /// The operator dismissed the prompt
    Cancelled,
}

impl BinarySelectionResult {
    /// The selected binary, if any
    #[must_use]
    pub fn selected(&self) -> Option<&CachedBinaryMetadata> {
        match self {
            Self::Selected { binary, .. } => Some(binary),
            _ => None,
        }
    }

    #[must_use]
    pub fn should_build(&self) -> bool {
        matches!(self, Self::Build { .. })
    }

    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
