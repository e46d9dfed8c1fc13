//! Upgrade orchestration error types

use std::borrow::Cow;

use crate::{CacheError, ChainError, Error, StorageError, UserFacingError};

#[derive(Debug, Clone, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum UpgradeError {
    #[error("an upgrade name is required for a governance upgrade")]
    MissingUpgradeName,

    #[error("invalid execution mode: {mode}")]
    InvalidMode { mode: String },

    #[error("invalid upgrade input: {message}")]
    InvalidInput { message: String },

    #[error("no upgrade target: provide a binary, image, cache ref or version")]
    MissingTarget,

    #[error("building {reference} from source is not available: {message}")]
    BuildUnavailable { reference: String, message: String },

    #[error("build of {reference} failed: {message}")]
    BuildFailed { reference: String, message: String },

    #[error("devnet metadata not found at {path}")]
    MetadataNotFound { path: String },

    #[error("devnet has no validators configured")]
    NoValidators,

    #[error("failed to stop nodes: {message}")]
    StopFailed { message: String },

    #[error("failed to start nodes: {message}")]
    StartFailed { message: String },

    #[error("genesis export failed: {message}")]
    ExportFailed { message: String },
}

impl UserFacingError for UpgradeError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingUpgradeName => {
                Some("Pass --name with the upgrade handler name registered in the new binary.")
            }
            Self::InvalidMode { .. } => Some("Use --mode docker or --mode local."),
            Self::MissingTarget => Some("Pass one of --binary, --image, --cache-ref or --version."),
            Self::BuildUnavailable { .. } => {
                Some("Build the binary separately and import it with `devnet cache import`.")
            }
            Self::MetadataNotFound { .. } => {
                Some("Check --home points at an existing devnet created by `devnet deploy`.")
            }
            Self::StopFailed { .. } | Self::StartFailed { .. } => {
                Some("devnet may be in an intermediate state; run `devnet status`.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::StartFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingUpgradeName => "upgrade.missing_name",
            Self::InvalidMode { .. } => "upgrade.invalid_mode",
            Self::InvalidInput { .. } => "upgrade.invalid_input",
            Self::MissingTarget => "upgrade.missing_target",
            Self::BuildUnavailable { .. } => "upgrade.build_unavailable",
            Self::BuildFailed { .. } => "upgrade.build_failed",
            Self::MetadataNotFound { .. } => "upgrade.metadata_not_found",
            Self::NoValidators => "upgrade.no_validators",
            Self::StopFailed { .. } => "upgrade.stop_failed",
            Self::StartFailed { .. } => "upgrade.start_failed",
            Self::ExportFailed { .. } => "upgrade.export_failed",
        };
        Some(code)
    }
}

/// Coarse failure classes used to decide how an upgrade failure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FailureKind {
    /// Bad input detected before any side effect
    Configuration,
    /// No usable binary or image could be resolved
    Resolution,
    /// Failure after the devnet was mutated on-chain
    Chain,
    /// Switching the active binary failed; previous activation intact
    Activation,
    /// Signal-driven interruption
    Cancelled,
    /// Anything else (I/O, internal)
    Other,
}

impl Error {
    /// Classify this error into the upgrade failure taxonomy
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Config(_)
            | Error::Upgrade(
                UpgradeError::MissingUpgradeName
                | UpgradeError::InvalidMode { .. }
                | UpgradeError::InvalidInput { .. }
                | UpgradeError::MissingTarget
                | UpgradeError::MetadataNotFound { .. }
                | UpgradeError::NoValidators,
            ) => FailureKind::Configuration,
            Error::Cache(CacheError::MissingTarget { .. })
            | Error::Storage(
                StorageError::AtomicRenameFailed { .. } | StorageError::SymlinkFailed { .. },
            ) => FailureKind::Activation,
            Error::Cache(_)
            | Error::Upgrade(
                UpgradeError::BuildUnavailable { .. } | UpgradeError::BuildFailed { .. },
            ) => FailureKind::Resolution,
            Error::Chain(
                ChainError::ProposalFailed { .. }
                | ChainError::VoteFailed { .. }
                | ChainError::ProposalRejected { .. }
                | ChainError::WaitTimeout { .. }
                | ChainError::NotResumed { .. },
            )
            | Error::Upgrade(UpgradeError::StopFailed { .. } | UpgradeError::StartFailed { .. }) => {
                FailureKind::Chain
            }
            Error::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        }
    }
}
