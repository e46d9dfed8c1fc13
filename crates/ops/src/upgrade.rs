//! Upgrade orchestration
//!
//! Takes a running devnet from one binary or image to another, either
//! through an expedited governance proposal or, for local iteration, by
//! replacing the binary directly.

mod height;
mod orchestrator;
mod stage;

pub use height::{BlockTimeSampler, ConservativeHeightPlanner, HeightPlan, HeightPlanner};
pub use orchestrator::{UpgradeDeps, UpgradeOrchestrator};
pub use stage::StageHandle;

use devnet_errors::{Error, UserFacingError};
use devnet_types::{ExecutionMode, UpgradeStage};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// What to upgrade to and how
#[derive(Debug, Clone)]
pub struct ExecuteUpgradeInput {
    /// Upgrade handler name; required unless `skip_governance`
    pub upgrade_name: String,
    pub mode: ExecutionMode,
    /// Local binary to import into the cache and activate
    pub target_binary: Option<PathBuf>,
    /// Commit `target_binary` was built from; asked from the binary if unset
    pub target_commit: Option<String>,
    /// Image reference for docker mode
    pub target_image: Option<String>,
    /// Version to upgrade to; resolves to a cached ref or a published image
    pub target_version: Option<String>,
    /// Cached commit (prefix) or ref to activate
    pub cache_ref: Option<String>,
    pub voting_period: Duration,
    /// Use `voting_period` without asking the chain
    pub force_voting_period: bool,
    /// Blocks added after voting ends; zero derives a margin
    pub height_buffer: u64,
    /// Export genesis before and after the switch
    pub with_export: bool,
    pub skip_governance: bool,
}

impl Default for ExecuteUpgradeInput {
    fn default() -> Self {
        Self {
            upgrade_name: String::new(),
            mode: ExecutionMode::default(),
            target_binary: None,
            target_commit: None,
            target_image: None,
            target_version: None,
            cache_ref: None,
            voting_period: Duration::from_secs(60),
            force_voting_period: false,
            height_buffer: 0,
            with_export: false,
            skip_governance: false,
        }
    }
}

/// Result of one upgrade run
///
/// Populated as far as the run got. On failure `last_stage` tells the
/// operator how much of the protocol already happened.
#[derive(Debug, Clone, Default)]
pub struct ExecuteUpgradeOutput {
    pub proposal_id: Option<u64>,
    pub upgrade_height: Option<u64>,
    pub post_upgrade_height: Option<u64>,
    /// Binary path or image the nodes now run
    pub new_binary: Option<String>,
    pub new_version: Option<String>,
    pub duration: Duration,
    pub pre_genesis_path: Option<PathBuf>,
    pub post_genesis_path: Option<PathBuf>,
    pub success: bool,
    pub error: Option<Error>,
    pub last_stage: UpgradeStage,
}

/// Serializable summary of an [`ExecuteUpgradeOutput`]
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeReport {
    pub success: bool,
    pub last_stage: UpgradeStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_upgrade_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_binary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_genesis_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_genesis_path: Option<PathBuf>,
    /// Set when the run failed; the fields below then match the CLI error shape
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&ExecuteUpgradeOutput> for UpgradeReport {
    fn from(output: &ExecuteUpgradeOutput) -> Self {
        Self {
            success: output.success,
            last_stage: output.last_stage,
            proposal_id: output.proposal_id,
            upgrade_height: output.upgrade_height,
            post_upgrade_height: output.post_upgrade_height,
            new_binary: output.new_binary.clone(),
            new_version: output.new_version.clone(),
            duration_ms: u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX),
            pre_genesis_path: output.pre_genesis_path.clone(),
            post_genesis_path: output.post_genesis_path.clone(),
            error: output.error.is_some(),
            code: output
                .error
                .as_ref()
                .and_then(UserFacingError::user_code)
                .map(ToString::to_string),
            message: output
                .error
                .as_ref()
                .map(|e| e.user_message().into_owned()),
            hint: output
                .error
                .as_ref()
                .and_then(UserFacingError::user_hint)
                .map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devnet_errors::ChainError;

    #[test]
    fn test_failed_report_carries_error_shape() {
        let output = ExecuteUpgradeOutput {
            last_stage: UpgradeStage::VerifyingResumption,
            error: Some(
                ChainError::NotResumed {
                    height: 121,
                    target: 122,
                }
                .into(),
            ),
            ..ExecuteUpgradeOutput::default()
        };
        let value = serde_json::to_value(UpgradeReport::from(&output)).unwrap();
        assert_eq!(value["error"], true);
        assert_eq!(value["success"], false);
        assert!(value["code"].is_string());
        assert!(value["message"].as_str().unwrap().contains("121"));
        assert_eq!(value["last_stage"], "verifying_resumption");

        let ok = ExecuteUpgradeOutput {
            success: true,
            ..ExecuteUpgradeOutput::default()
        };
        let value = serde_json::to_value(UpgradeReport::from(&ok)).unwrap();
        assert!(value.get("error").is_none());
        assert!(value.get("message").is_none());
    }
}
