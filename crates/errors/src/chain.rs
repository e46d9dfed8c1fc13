//! Chain RPC and governance interaction errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ChainError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("unexpected RPC response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("proposal submission failed: {message}")]
    ProposalFailed { message: String },

    #[error("vote from {validator} failed: {message}")]
    VoteFailed { validator: String, message: String },

    #[error("proposal {proposal_id} was not accepted: {status}")]
    ProposalRejected { proposal_id: u64, status: String },

    #[error("timed out after {seconds}s waiting for {what}")]
    WaitTimeout { what: String, seconds: u64 },

    #[error("chain did not resume: height {height} has not passed {target}")]
    NotResumed { height: u64, target: u64 },
}

impl UserFacingError for ChainError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::ConnectionRefused(_) => {
                Some("Check that the devnet nodes are running and the RPC endpoint is reachable.")
            }
            Self::ProposalFailed { .. }
            | Self::VoteFailed { .. }
            | Self::ProposalRejected { .. }
            | Self::WaitTimeout { .. }
            | Self::NotResumed { .. } => {
                Some("devnet may be in an intermediate state; run `devnet status`.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectionRefused(_) | Self::RequestFailed(_)
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Timeout { .. } => "chain.timeout",
            Self::ConnectionRefused(_) => "chain.connection_refused",
            Self::InvalidUrl(_) => "chain.invalid_url",
            Self::HttpError { .. } => "chain.http_error",
            Self::InvalidResponse { .. } => "chain.invalid_response",
            Self::RequestFailed(_) => "chain.request_failed",
            Self::ProposalFailed { .. } => "chain.proposal_failed",
            Self::VoteFailed { .. } => "chain.vote_failed",
            Self::ProposalRejected { .. } => "chain.proposal_rejected",
            Self::WaitTimeout { .. } => "chain.wait_timeout",
            Self::NotResumed { .. } => "chain.not_resumed",
        };
        Some(code)
    }
}
