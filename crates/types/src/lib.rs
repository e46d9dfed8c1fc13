#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the devnet toolchain
//!
//! This crate provides the data model shared by the cache, activation and
//! upgrade crates: cache keys, cached binary metadata, the active binary
//! pointer, devnet metadata and upgrade stages.

pub mod binary;
pub mod cache_key;
pub mod devnet;
pub mod upgrade;

// Re-export commonly used types
pub use binary::{ActiveSymlink, BinarySelectionResult, CachedBinaryMetadata};
pub use cache_key::{
    is_valid_cache_key, is_valid_commit_hash, CacheKey, ConfigHash, COMMIT_HASH_LEN,
    SHORT_COMMIT_LEN,
};
pub use devnet::{DevnetMetadata, ValidatorInfo};
pub use semver::Version;
pub use upgrade::{GovParams, GovParamsSource, ProposalStatus, UpgradeStage};

use serde::{Deserialize, Serialize};

/// How devnet nodes are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Nodes run in containers; upgrades swap the image reference
    #[default]
    Docker,
    /// Nodes run as local processes; upgrades switch the active binary
    Local,
}

impl ExecutionMode {
    /// Parse a mode name as accepted on the command line
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "docker" => Some(Self::Docker),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl clap::ValueEnum for ExecutionMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Docker, Self::Local]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Docker => clap::builder::PossibleValue::new("docker"),
            Self::Local => clap::builder::PossibleValue::new("local"),
        })
    }
}

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tty,
    Json,
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}

// Implement clap::ValueEnum for ColorChoice
impl clap::ValueEnum for ColorChoice {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Always, Self::Auto, Self::Never]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Always => clap::builder::PossibleValue::new("always"),
            Self::Auto => clap::builder::PossibleValue::new("auto"),
            Self::Never => clap::builder::PossibleValue::new("never"),
        })
    }
}

/// Whether a version string is a standard release tag (`v1.2.3`, `1.2.3-rc.1`)
///
/// Standard tags resolve to published images; anything else (branches,
/// commits) must be built from source.
#[must_use]
pub fn is_standard_version_tag(value: &str) -> bool {
    let trimmed = value.strip_prefix('v').unwrap_or(value);
    Version::parse(trimmed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_version_tags() {
        assert!(is_standard_version_tag("v0.50.10"));
        assert!(is_standard_version_tag("1.2.3-rc.1"));
        assert!(!is_standard_version_tag("main"));
        assert!(!is_standard_version_tag("feature/fast-blocks"));
        assert!(!is_standard_version_tag("v1.2"));
    }

    #[test]
    fn test_execution_mode_parse() {
        assert_eq!(ExecutionMode::parse("Docker"), Some(ExecutionMode::Docker));
        assert_eq!(ExecutionMode::parse("local"), Some(ExecutionMode::Local));
        assert_eq!(ExecutionMode::parse("k8s"), None);
    }
}
