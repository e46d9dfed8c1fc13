//! Upgrade stages and governance parameter types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stage of an upgrade run
///
/// The governance path walks `ResolvingTarget` through `VerifyingResumption`;
/// the skip-governance path goes `ResolvingTarget`, `StoppingNodes`,
/// `BinarySwitched`, `RestartingNodes`, `VerifyingResumption`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStage {
    #[default]
    ResolvingTarget,
    ResolvingGovParams,
    PlanPrinted,
    ProposalSubmitted,
    VotingInProgress,
    AwaitingUpgradeHeight,
    StoppingNodes,
    BinarySwitched,
    RestartingNodes,
    VerifyingResumption,
    Succeeded,
    Failed,
}

impl UpgradeStage {
    /// Whether the run has finished, successfully or not
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether reaching this stage means the devnet has been mutated
    ///
    /// Failures after such a stage leave state the operator has to inspect.
    #[must_use]
    pub fn has_side_effects(self) -> bool {
        !matches!(
            self,
            Self::ResolvingTarget | Self::ResolvingGovParams | Self::PlanPrinted
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolvingTarget => "resolving_target",
            Self::ResolvingGovParams => "resolving_gov_params",
            Self::PlanPrinted => "plan_printed",
            Self::ProposalSubmitted => "proposal_submitted",
            Self::VotingInProgress => "voting_in_progress",
            Self::AwaitingUpgradeHeight => "awaiting_upgrade_height",
            Self::StoppingNodes => "stopping_nodes",
            Self::BinarySwitched => "binary_switched",
            Self::RestartingNodes => "restarting_nodes",
            Self::VerifyingResumption => "verifying_resumption",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UpgradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved voting period came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovParamsSource {
    /// Explicit force flag
    Forced,
    /// Network module plugin query
    Plugin,
    /// Generic chain REST query
    Chain,
    /// CLI value used after the chain query failed
    Fallback,
}

impl fmt::Display for GovParamsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "forced"),
            Self::Plugin => write!(f, "plugin"),
            Self::Chain => write!(f, "chain"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Governance parameters needed to time an upgrade
///
/// Resolved once per upgrade and never cached across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovParams {
    pub expedited_voting_period: Duration,
}

/// On-chain status of a governance proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    DepositPeriod,
    VotingPeriod,
    Passed,
    Rejected,
    Failed,
    Unknown,
}

impl ProposalStatus {
    /// Parse the `PROPOSAL_STATUS_*` names used by Cosmos SDK chains
    #[must_use]
    pub fn from_chain(value: &str) -> Self {
        let name = value
            .trim()
            .trim_start_matches("PROPOSAL_STATUS_")
            .to_ascii_uppercase();
        match name.as_str() {
            "DEPOSIT_PERIOD" | "1" => Self::DepositPeriod,
            "VOTING_PERIOD" | "2" => Self::VotingPeriod,
            "PASSED" | "3" => Self::Passed,
            "REJECTED" | "4" => Self::Rejected,
            "FAILED" | "5" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Whether voting has concluded without the proposal passing
    #[must_use]
    pub fn is_final_failure(self) -> bool {
        matches!(self, Self::Rejected | Self::Failed)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DepositPeriod => "deposit_period",
            Self::VotingPeriod => "voting_period",
            Self::Passed => "passed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_status_from_chain() {
        assert_eq!(
            ProposalStatus::from_chain("PROPOSAL_STATUS_PASSED"),
            ProposalStatus::Passed
        );
        assert_eq!(
            ProposalStatus::from_chain("PROPOSAL_STATUS_VOTING_PERIOD"),
            ProposalStatus::VotingPeriod
        );
        assert_eq!(ProposalStatus::from_chain("4"), ProposalStatus::Rejected);
        assert_eq!(ProposalStatus::from_chain("bogus"), ProposalStatus::Unknown);
        assert!(ProposalStatus::Failed.is_final_failure());
    }

    #[test]
    fn test_stage_side_effects() {
        assert!(!UpgradeStage::PlanPrinted.has_side_effects());
        assert!(UpgradeStage::ProposalSubmitted.has_side_effects());
        assert!(UpgradeStage::StoppingNodes.has_side_effects());
        assert!(UpgradeStage::Failed.is_terminal());
        assert_eq!(
            UpgradeStage::AwaitingUpgradeHeight.to_string(),
            "awaiting_upgrade_height"
        );
    }
}
