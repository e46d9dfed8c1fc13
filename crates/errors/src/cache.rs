//! Binary cache, validation and selection errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CacheError {
    #[error("invalid cache key: {key}")]
    InvalidKey { key: String },

    #[error("invalid commit hash: {value}")]
    InvalidCommitHash { value: String },

    #[error("cache entry not found: {key}")]
    EntryNotFound { key: String },

    #[error("no cached binary for commit {commit}")]
    CommitNotCached { commit: String },

    #[error("no cached binaries found for {binary_name}")]
    NoCachedBinaries { binary_name: String },

    #[error("found {found} cached binaries but all failed validation: {reasons}")]
    AllInvalid { found: usize, reasons: String },

    #[error("{count} valid binaries available; an explicit choice is required")]
    AmbiguousSelection { count: usize },

    #[error("binary selection requires an interactive terminal")]
    NotInteractive,

    #[error("interactive prompt failed: {message}")]
    PromptFailed { message: String },

    #[error("activation target does not exist: {path}")]
    MissingTarget { path: String },

    #[error("corrupted metadata for {path}: {message}")]
    CorruptedMetadata { path: String, message: String },
}

impl UserFacingError for CacheError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoCachedBinaries { .. } | Self::CommitNotCached { .. } => Some(
                "Build or import the binary first (`devnet cache import`), then retry the upgrade.",
            ),
            Self::AllInvalid { .. } => {
                Some("Rebuild the affected binaries or remove them with `devnet cache clean`.")
            }
            Self::AmbiguousSelection { .. } | Self::NotInteractive => {
                Some("Pass --cache-ref or --binary to choose a binary explicitly.")
            }
            Self::InvalidKey { .. } => {
                Some("Cache keys have the form <40-hex commit>-<8-hex config hash>.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidKey { .. } => "cache.invalid_key",
            Self::InvalidCommitHash { .. } => "cache.invalid_commit",
            Self::EntryNotFound { .. } => "cache.entry_not_found",
            Self::CommitNotCached { .. } => "cache.commit_not_cached",
            Self::NoCachedBinaries { .. } => "cache.no_valid_binary",
            Self::AllInvalid { .. } => "cache.all_invalid",
            Self::AmbiguousSelection { .. } => "cache.ambiguous_selection",
            Self::NotInteractive => "cache.not_interactive",
            Self::PromptFailed { .. } => "cache.prompt_failed",
            Self::MissingTarget { .. } => "cache.missing_target",
            Self::CorruptedMetadata { .. } => "cache.corrupted_metadata",
        };
        Some(code)
    }
}
