//! Chain queries used while planning and supervising an upgrade
//!
//! Heights and block times come from the CometBFT RPC endpoint; governance
//! parameters come from the Cosmos SDK REST gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devnet_errors::{ChainError, Error};
use devnet_types::GovParams;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::NetClient;

/// Read-only view of a running chain
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Latest committed block height
    async fn get_height(&self) -> Result<u64, Error>;

    /// Header timestamp of the block at `height`
    async fn get_block_time(&self, height: u64) -> Result<DateTime<Utc>, Error>;

    /// Governance parameters as reported by the chain
    async fn get_gov_params(&self) -> Result<GovParams, Error>;
}

/// `RpcClient` backed by CometBFT RPC and the Cosmos REST gateway
#[derive(Clone)]
pub struct CometRpcClient {
    net: NetClient,
    rpc_url: String,
    rest_url: String,
}

impl CometRpcClient {
    #[must_use]
    pub fn new(net: NetClient, rpc_url: &str, rest_url: &str) -> Self {
        Self {
            net,
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            rest_url: rest_url.trim_end_matches('/').to_string(),
        }
    }

    async fn rpc_result(&self, path: &str) -> Result<(String, Value), Error> {
        let url = format!("{}{path}", self.rpc_url);
        let mut body: Value = self.net.get_json(&url).await?;
        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            return Err(ChainError::InvalidResponse {
                endpoint: url,
                message: error.to_string(),
            }
            .into());
        }
        // Older nodes return the result object bare
        let result = match body.get_mut("result") {
            Some(result) => result.take(),
            None => body,
        };
        Ok((url, result))
    }
}

#[derive(Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Deserialize)]
struct BlockResult {
    block: Block,
}

#[derive(Deserialize)]
struct Block {
    header: Header,
}

#[derive(Deserialize)]
struct Header {
    time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct VotingParamsResponse {
    params: Option<GovParamsBody>,
}

#[derive(Deserialize)]
struct GovParamsBody {
    expedited_voting_period: Option<String>,
}

fn invalid(endpoint: &str, message: impl Into<String>) -> Error {
    ChainError::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: message.into(),
    }
    .into()
}

#[async_trait]
impl RpcClient for CometRpcClient {
    async fn get_height(&self) -> Result<u64, Error> {
        let (url, result) = self.rpc_result("/status").await?;
        let status: StatusResult =
            serde_json::from_value(result).map_err(|e| invalid(&url, e.to_string()))?;
        status
            .sync_info
            .latest_block_height
            .parse()
            .map_err(|_| invalid(&url, "latest_block_height is not a number"))
    }

    async fn get_block_time(&self, height: u64) -> Result<DateTime<Utc>, Error> {
        let (url, result) = self.rpc_result(&format!("/block?height={height}")).await?;
        let block: BlockResult =
            serde_json::from_value(result).map_err(|e| invalid(&url, e.to_string()))?;
        Ok(block.block.header.time)
    }

    async fn get_gov_params(&self) -> Result<GovParams, Error> {
        let url = format!("{}/cosmos/gov/v1/params/voting", self.rest_url);
        let response: VotingParamsResponse = self.net.get_json(&url).await?;
        let raw = response
            .params
            .and_then(|p| p.expedited_voting_period)
            .ok_or_else(|| invalid(&url, "expedited_voting_period missing"))?;
        let expedited_voting_period = parse_proto_duration(&raw)
            .ok_or_else(|| invalid(&url, format!("unparseable duration {raw:?}")))?;
        Ok(GovParams {
            expedited_voting_period,
        })
    }
}

/// Parse a protobuf JSON duration such as `"60s"` or `"0.500s"`
#[must_use]
pub fn parse_proto_duration(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().strip_suffix('s')?.parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proto_duration() {
        assert_eq!(parse_proto_duration("60s"), Some(Duration::from_secs(60)));
        assert_eq!(
            parse_proto_duration("0.500s"),
            Some(Duration::from_millis(500))
        );
        assert_eq!(parse_proto_duration("60"), None);
        assert_eq!(parse_proto_duration("-1s"), None);
        assert_eq!(parse_proto_duration("abcs"), None);
    }
}
