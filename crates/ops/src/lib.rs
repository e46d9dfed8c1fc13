#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

//! High-level operations orchestration for devnet
//!
//! This crate sits between the CLI and the specialized crates. It wires
//! the cache, activation pointer, chain client and node control into the
//! operations the CLI exposes, the largest being the upgrade orchestrator.

mod context;
pub mod export;
pub mod gov_params;
pub mod governance;
mod maintenance;
pub mod network;
pub mod nodes;
mod query;
pub mod selector;
mod types;
pub mod upgrade;

pub use context::{OpsContextBuilder, OpsCtx};
pub use gov_params::{GovParamsProvider, GovParamsResolver, ResolvedGovParams};
pub use network::{ChainCli, CosmosModule, NetworkModule};
pub use selector::{
    BinarySelector, DialoguerPrompt, NonInteractive, SelectionPrompt, SelectorOptions,
};
pub use types::{
    CacheChange, CacheListing, DevnetSummary, ImportRequest, NodeStatus, StatusReport,
};
pub use upgrade::{
    ExecuteUpgradeInput, ExecuteUpgradeOutput, StageHandle, UpgradeOrchestrator, UpgradeReport,
};

// Re-export operation functions
pub use maintenance::{cache_clean, cache_import, cache_use, migrate};
pub use query::{cache_list, status};

use devnet_errors::Error;

/// Operation result that can be serialized for CLI output
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OperationResult {
    /// Devnet status
    Status(StatusReport),
    /// Cached binaries
    CacheListing(CacheListing),
    /// Import, use, clean or migrate outcome
    CacheChange(CacheChange),
    /// Upgrade outcome
    Upgrade(UpgradeReport),
}

impl OperationResult {
    /// Convert to JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check if this is a success result
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            OperationResult::Status(_)
            | OperationResult::CacheListing(_)
            | OperationResult::CacheChange(_) => true,
            OperationResult::Upgrade(report) => report.success,
        }
    }
}
