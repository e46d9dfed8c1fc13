use serde::{Deserialize, Serialize};

use crate::EventSource;
use devnet_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod cache;
pub mod general;
pub mod upgrade;

pub use cache::CacheEvent;
pub use general::GeneralEvent;
pub use upgrade::UpgradeEvent;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Binary cache, validation, selection and activation
    Cache(CacheEvent),

    /// Upgrade orchestration progress
    Upgrade(UpgradeEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Cache(_) => EventSource::CACHE,
            Self::Upgrade(_) => EventSource::UPGRADE,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Upgrade(UpgradeEvent::Failed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Cache(CacheEvent::EntrySkipped { .. } | CacheEvent::BinaryInvalid { .. })
            | Self::Upgrade(
                UpgradeEvent::GovParamsFallback { .. }
                | UpgradeEvent::BlockTimeFallback { .. }
                | UpgradeEvent::SkipGovernanceWarning
                | UpgradeEvent::ExportFailed { .. }
                | UpgradeEvent::Cancelled { .. },
            ) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Cache(CacheEvent::ScanStarted { .. } | CacheEvent::BinaryValidated { .. })
            | Self::Upgrade(UpgradeEvent::HeightProgress { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }
}
