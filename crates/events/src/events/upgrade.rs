//! Upgrade orchestration events

use devnet_types::{ExecutionMode, GovParamsSource, UpgradeStage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::FailureContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeEvent {
    Started {
        upgrade_name: String,
        mode: ExecutionMode,
        skip_governance: bool,
    },

    /// The orchestrator completed a stage
    StageChanged { stage: UpgradeStage },

    GovParamsResolved {
        voting_period: Duration,
        source: GovParamsSource,
    },

    /// The chain query failed and the CLI value is used instead
    GovParamsFallback {
        voting_period: Duration,
        reason: String,
    },

    BlockTimeSampled {
        average: Duration,
        samples: usize,
    },

    BlockTimeFallback { block_time: Duration, reason: String },

    /// Computed plan, printed before anything is submitted
    Plan {
        current_height: u64,
        upgrade_height: u64,
        voting_period: Duration,
        average_block_time: Duration,
        margin_blocks: u64,
    },

    ProposalSubmitted {
        proposal_id: u64,
        upgrade_height: u64,
    },

    VoteCast { validator: String, proposal_id: u64 },

    HeightProgress { current: u64, target: u64 },

    ProposalPassed { proposal_id: u64 },

    UpgradeHeightReached { height: u64 },

    /// Fast path chosen; chain state compatibility is the operator's concern
    SkipGovernanceWarning,

    NodesStopped { count: usize },

    NodesStarted { count: usize },

    BinarySwitched {
        mode: ExecutionMode,
        target: String,
    },

    GenesisExported { label: String, path: PathBuf },

    /// Export failures do not fail the upgrade
    ExportFailed { label: String, reason: String },

    /// Chain produced blocks past the upgrade height
    Resumed { height: u64 },

    Completed {
        duration: Duration,
        post_upgrade_height: u64,
    },

    Failed {
        stage: UpgradeStage,
        failure: FailureContext,
    },

    Cancelled { stage: UpgradeStage },
}
