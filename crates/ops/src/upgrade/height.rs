//! Upgrade height planning
//!
//! The proposal names a height that must only be reached after voting ends.
//! Block time is estimated from recent headers and turned into a block count
//! covering the voting period plus a safety margin.

use devnet_errors::{ChainError, Error};
use devnet_net::RpcClient;
use std::sync::Arc;
use std::time::Duration;

/// Estimates average block time from the most recent headers
pub struct BlockTimeSampler {
    rpc: Arc<dyn RpcClient>,
    samples: u64,
}

impl BlockTimeSampler {
    #[must_use]
    pub fn new(rpc: Arc<dyn RpcClient>, samples: u64) -> Self {
        Self {
            rpc,
            samples: samples.max(1),
        }
    }

    /// Average block time over the last `samples` blocks ending at `current_height`
    ///
    /// Returns the average and the number of block intervals it covers.
    ///
    /// # Errors
    /// Returns an error if the chain is too young or a header cannot be read.
    pub async fn sample(&self, current_height: u64) -> Result<(Duration, u64), Error> {
        if current_height < 2 {
            return Err(ChainError::InvalidResponse {
                endpoint: "block".to_string(),
                message: format!("height {current_height} is too low to sample block time"),
            }
            .into());
        }
        let intervals = self.samples.min(current_height - 1);
        let start = current_height - intervals;

        let first = self.rpc.get_block_time(start).await?;
        let last = self.rpc.get_block_time(current_height).await?;
        let span = (last - first)
            .to_std()
            .ok()
            .filter(|span| !span.is_zero())
            .ok_or_else(|| ChainError::InvalidResponse {
                endpoint: "block".to_string(),
                message: format!("block times between {start} and {current_height} do not advance"),
            })?;

        Ok((span / u32::try_from(intervals).unwrap_or(u32::MAX), intervals))
    }
}

/// A computed upgrade height and how it was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightPlan {
    pub current_height: u64,
    pub voting_period: Duration,
    pub average_block_time: Duration,
    /// Blocks expected during the voting period
    pub voting_blocks: u64,
    /// Blocks added past the expected end of voting
    pub margin_blocks: u64,
    pub upgrade_height: u64,
}

/// Strategy turning timing estimates into an upgrade height
pub trait HeightPlanner: Send + Sync {
    /// `height_buffer` is the operator's explicit margin; zero means derive one
    fn plan(
        &self,
        current_height: u64,
        voting_period: Duration,
        average_block_time: Duration,
        height_buffer: u64,
    ) -> HeightPlan;
}

/// Covers the whole voting period and adds `max(min_margin, ratio * voting_blocks)`
#[derive(Debug, Clone, Copy)]
pub struct ConservativeHeightPlanner {
    pub min_margin_blocks: u64,
    pub margin_ratio: f64,
}

impl Default for ConservativeHeightPlanner {
    fn default() -> Self {
        Self {
            min_margin_blocks: 10,
            margin_ratio: 0.2,
        }
    }
}

impl HeightPlanner for ConservativeHeightPlanner {
    fn plan(
        &self,
        current_height: u64,
        voting_period: Duration,
        average_block_time: Duration,
        height_buffer: u64,
    ) -> HeightPlan {
        let block_ms = average_block_time.as_millis().max(1);
        let voting_blocks = u64::try_from(voting_period.as_millis().div_ceil(block_ms))
            .unwrap_or(u64::MAX);

        let margin_blocks = if height_buffer > 0 {
            height_buffer
        } else {
            let proportional = (voting_blocks as f64 * self.margin_ratio.max(0.0)).ceil() as u64;
            self.min_margin_blocks.max(proportional)
        }
        .max(1);

        HeightPlan {
            current_height,
            voting_period,
            average_block_time,
            voting_blocks,
            margin_blocks,
            upgrade_height: current_height
                .saturating_add(voting_blocks)
                .saturating_add(margin_blocks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use devnet_types::GovParams;

    #[test]
    fn test_sixty_second_vote_at_five_second_blocks() {
        let plan = ConservativeHeightPlanner::default().plan(
            100,
            Duration::from_secs(60),
            Duration::from_secs(5),
            0,
        );
        assert_eq!(plan.voting_blocks, 12);
        assert_eq!(plan.margin_blocks, 10);
        assert!(plan.upgrade_height > 100 + 12);
        assert_eq!(plan.upgrade_height, 122);
    }

    #[test]
    fn test_long_vote_uses_proportional_margin() {
        let plan = ConservativeHeightPlanner::default().plan(
            0,
            Duration::from_secs(600),
            Duration::from_secs(1),
            0,
        );
        assert_eq!(plan.voting_blocks, 600);
        assert_eq!(plan.margin_blocks, 120);
    }

    #[test]
    fn test_explicit_buffer_and_partial_blocks() {
        let plan = ConservativeHeightPlanner::default().plan(
            50,
            Duration::from_secs(10),
            Duration::from_millis(3000),
            3,
        );
        // 10s at 3s per block needs 4 blocks, not 3
        assert_eq!(plan.voting_blocks, 4);
        assert_eq!(plan.margin_blocks, 3);
        assert_eq!(plan.upgrade_height, 57);
    }

    struct SteadyChain {
        block_time: Duration,
    }

    #[async_trait]
    impl RpcClient for SteadyChain {
        async fn get_height(&self) -> Result<u64, Error> {
            Ok(100)
        }

        async fn get_block_time(&self, height: u64) -> Result<DateTime<Utc>, Error> {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let offset = chrono::Duration::from_std(self.block_time * u32::try_from(height).unwrap())
                .unwrap();
            Ok(base + offset)
        }

        async fn get_gov_params(&self) -> Result<GovParams, Error> {
            Err(Error::internal("unused"))
        }
    }

    #[tokio::test]
    async fn test_sampler_averages_recent_blocks() {
        let sampler = BlockTimeSampler::new(
            Arc::new(SteadyChain {
                block_time: Duration::from_millis(2500),
            }),
            10,
        );
        let (average, intervals) = sampler.sample(100).await.unwrap();
        assert_eq!(average, Duration::from_millis(2500));
        assert_eq!(intervals, 10);

        let (_, intervals) = sampler.sample(4).await.unwrap();
        assert_eq!(intervals, 3);
        assert!(sampler.sample(1).await.is_err());
    }
}
