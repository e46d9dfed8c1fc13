//! Submitting and following software-upgrade proposals

use crate::network::ChainCli;
use async_trait::async_trait;
use devnet_errors::{ChainError, Error};
use devnet_platform::{CommandExecutor, PlatformCommand};
use devnet_types::{ProposalStatus, ValidatorInfo};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// An expedited software-upgrade proposal
#[derive(Debug, Clone)]
pub struct UpgradeProposal {
    /// Upgrade handler name registered in the new binary
    pub name: String,
    pub height: u64,
    pub title: String,
    pub summary: String,
    /// Validator whose key submits and funds the proposal
    pub proposer: ValidatorInfo,
}

/// Governance transactions and queries
#[async_trait]
pub trait GovernanceClient: Send + Sync {
    /// Submit the proposal and return its id
    async fn submit_upgrade_proposal(&self, proposal: &UpgradeProposal) -> Result<u64, Error>;

    /// Vote yes on `proposal_id` with the validator's key
    async fn vote_yes(&self, validator: &ValidatorInfo, proposal_id: u64) -> Result<(), Error>;

    async fn proposal_status(&self, proposal_id: u64) -> Result<ProposalStatus, Error>;
}

/// Chain transaction settings shared by every governance command
#[derive(Debug, Clone)]
pub struct TxSettings {
    pub chain_id: String,
    pub node_url: String,
    pub keyring_backend: String,
    pub fees: String,
    pub deposit: String,
}

/// `GovernanceClient` driving the chain binary's own CLI
pub struct CliGovernanceClient {
    executor: Arc<dyn CommandExecutor>,
    cli: ChainCli,
    settings: TxSettings,
    /// Delay between proposal lookups after submission
    poll_interval: Duration,
    lookup_attempts: u32,
}

impl CliGovernanceClient {
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>, cli: ChainCli, settings: TxSettings) -> Self {
        Self {
            executor,
            cli,
            settings,
            poll_interval: Duration::from_secs(1),
            lookup_attempts: 15,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn tx_command(&self, validator: &ValidatorInfo, args: &[String]) -> PlatformCommand {
        let home = validator.home.display().to_string();
        let mut full: Vec<String> = args.to_vec();
        full.extend([
            "--from".to_string(),
            validator.key_name.clone(),
            "--home".to_string(),
            home,
            "--keyring-backend".to_string(),
            self.settings.keyring_backend.clone(),
            "--chain-id".to_string(),
            self.settings.chain_id.clone(),
            "--node".to_string(),
            self.settings.node_url.clone(),
            "--fees".to_string(),
            self.settings.fees.clone(),
            "--yes".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ]);
        self.cli.command(full, &[validator.home.as_path()])
    }

    fn query_command(&self, args: &[&str]) -> PlatformCommand {
        let mut full: Vec<String> = args.iter().map(ToString::to_string).collect();
        full.extend([
            "--node".to_string(),
            self.settings.node_url.clone(),
            "--output".to_string(),
            "json".to_string(),
        ]);
        self.cli.command(full, &[])
    }

    async fn run_json(&self, cmd: &PlatformCommand) -> Result<Value, Error> {
        let output = self.executor.run(cmd).await?.into_success(cmd)?;
        let stdout = output.stdout_str();
        serde_json::from_str(stdout.trim()).map_err(|e| {
            ChainError::InvalidResponse {
                endpoint: cmd.display(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Highest proposal id currently known to the chain
    async fn latest_proposal_id(&self) -> Result<u64, Error> {
        let cmd = self.query_command(&["query", "gov", "proposals"]);
        match self.run_json(&cmd).await {
            Ok(body) => Ok(max_proposal_id(&body)),
            // An empty proposal list is reported as an error by older SDKs
            Err(Error::Platform(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Reject transactions the chain accepted into the mempool but refused
fn check_tx_code(body: &Value) -> Result<(), String> {
    match body.get("code").and_then(Value::as_u64) {
        None | Some(0) => Ok(()),
        Some(code) => {
            let log = body
                .get("raw_log")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Err(format!("code {code}: {log}"))
        }
    }
}

fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn max_proposal_id(body: &Value) -> u64 {
    body.get("proposals")
        .and_then(Value::as_array)
        .map(|proposals| {
            proposals
                .iter()
                .filter_map(|p| p.get("id").or_else(|| p.get("proposal_id")).and_then(parse_id))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

fn proposal_status_from(body: &Value) -> ProposalStatus {
    body.get("proposal")
        .unwrap_or(body)
        .get("status")
        .map_or(ProposalStatus::Unknown, |status| match status {
            Value::String(s) => ProposalStatus::from_chain(s),
            other => ProposalStatus::from_chain(&other.to_string()),
        })
}

#[async_trait]
impl GovernanceClient for CliGovernanceClient {
    async fn submit_upgrade_proposal(&self, proposal: &UpgradeProposal) -> Result<u64, Error> {
        let before = self.latest_proposal_id().await?;

        let args = vec![
            "tx".to_string(),
            "upgrade".to_string(),
            "software-upgrade".to_string(),
            proposal.name.clone(),
            "--upgrade-height".to_string(),
            proposal.height.to_string(),
            "--title".to_string(),
            proposal.title.clone(),
            "--summary".to_string(),
            proposal.summary.clone(),
            "--deposit".to_string(),
            self.settings.deposit.clone(),
            "--expedited".to_string(),
            "--no-validate".to_string(),
        ];
        let cmd = self.tx_command(&proposal.proposer, &args);
        let body = self.run_json(&cmd).await.map_err(|e| ChainError::ProposalFailed {
            message: e.to_string(),
        })?;
        check_tx_code(&body).map_err(|message| ChainError::ProposalFailed { message })?;

        // The broadcast returns before inclusion; wait for the new id to appear
        for _ in 0..self.lookup_attempts {
            tokio::time::sleep(self.poll_interval).await;
            let latest = self.latest_proposal_id().await?;
            if latest > before {
                return Ok(latest);
            }
        }
        Err(ChainError::ProposalFailed {
            message: "proposal was broadcast but never appeared on chain".to_string(),
        }
        .into())
    }

    async fn vote_yes(&self, validator: &ValidatorInfo, proposal_id: u64) -> Result<(), Error> {
        let args = vec![
            "tx".to_string(),
            "gov".to_string(),
            "vote".to_string(),
            proposal_id.to_string(),
            "yes".to_string(),
        ];
        let cmd = self.tx_command(validator, &args);
        let vote_failed = |message: String| ChainError::VoteFailed {
            validator: validator.name.clone(),
            message,
        };
        let body = self
            .run_json(&cmd)
            .await
            .map_err(|e| vote_failed(e.to_string()))?;
        check_tx_code(&body).map_err(vote_failed)?;
        Ok(())
    }

    async fn proposal_status(&self, proposal_id: u64) -> Result<ProposalStatus, Error> {
        let id = proposal_id.to_string();
        let cmd = self.query_command(&["query", "gov", "proposal", &id]);
        let body = self.run_json(&cmd).await?;
        Ok(proposal_status_from(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_max_proposal_id() {
        let body = json!({"proposals": [{"id": "3"}, {"id": "12"}, {"proposal_id": 7}]});
        assert_eq!(max_proposal_id(&body), 12);
        assert_eq!(max_proposal_id(&json!({"proposals": []})), 0);
        assert_eq!(max_proposal_id(&json!({})), 0);
    }

    #[test]
    fn test_proposal_status_shapes() {
        let nested = json!({"proposal": {"id": "1", "status": "PROPOSAL_STATUS_PASSED"}});
        assert_eq!(proposal_status_from(&nested), ProposalStatus::Passed);
        let flat = json!({"id": "1", "status": 2});
        assert_eq!(proposal_status_from(&flat), ProposalStatus::VotingPeriod);
        assert_eq!(proposal_status_from(&json!({})), ProposalStatus::Unknown);
    }

    #[test]
    fn test_check_tx_code() {
        assert!(check_tx_code(&json!({"code": 0, "txhash": "AB"})).is_ok());
        let err = check_tx_code(&json!({"code": 13, "raw_log": "insufficient fee"})).unwrap_err();
        assert_eq!(err, "code 13: insufficient fee");
    }
}
