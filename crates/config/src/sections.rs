//! Configuration sections and their defaults

use devnet_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
        }
    }
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Devnet home directory; `~/.devnet` when unset
    pub home: Option<PathBuf>,
}

/// Binary cache and validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_validation_timeout_secs")]
    pub validation_timeout_secs: u64,
    /// Arguments passed to a cached binary to make it report its version
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    #[serde(default = "default_auto_select_single")]
    pub auto_select_single: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            validation_timeout_secs: default_validation_timeout_secs(),
            version_args: default_version_args(),
            auto_select_single: true,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }
}

/// Chain connection and transaction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_network_type")]
    pub network_type: String,
    #[serde(default = "default_binary_name")]
    pub binary_name: String,
    /// Falls back to the chain id recorded in devnet metadata
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_docker_image")]
    pub docker_image: String,
    #[serde(default = "default_keyring_backend")]
    pub keyring_backend: String,
    #[serde(default = "default_fees")]
    pub fees: String,
    #[serde(default = "default_deposit")]
    pub deposit: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network_type: default_network_type(),
            binary_name: default_binary_name(),
            chain_id: None,
            rpc_url: default_rpc_url(),
            rest_url: default_rest_url(),
            docker_image: default_docker_image(),
            keyring_backend: default_keyring_backend(),
            fees: default_fees(),
            deposit: default_deposit(),
        }
    }
}

/// Upgrade timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Number of recent blocks averaged to estimate block time
    #[serde(default = "default_block_time_samples")]
    pub block_time_samples: u64,
    /// Block time assumed when sampling fails
    #[serde(default = "default_fallback_block_time_ms")]
    pub fallback_block_time_ms: u64,
    /// Minimum extra blocks after the voting period ends
    #[serde(default = "default_safety_margin_blocks")]
    pub safety_margin_blocks: u64,
    /// Extra blocks as a share of the voting period's blocks
    #[serde(default = "default_safety_margin_ratio")]
    pub safety_margin_ratio: f64,
    /// Time allowed past the expected voting end for the proposal to pass
    #[serde(default = "default_proposal_grace_secs")]
    pub proposal_grace_secs: u64,
    #[serde(default = "default_resumption_timeout_secs")]
    pub resumption_timeout_secs: u64,
    /// Time a node gets to exit after SIGTERM before it is killed
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    #[serde(default = "default_voting_period_secs")]
    pub default_voting_period_secs: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            block_time_samples: default_block_time_samples(),
            fallback_block_time_ms: default_fallback_block_time_ms(),
            safety_margin_blocks: default_safety_margin_blocks(),
            safety_margin_ratio: default_safety_margin_ratio(),
            proposal_grace_secs: default_proposal_grace_secs(),
            resumption_timeout_secs: default_resumption_timeout_secs(),
            stop_grace_secs: default_stop_grace_secs(),
            default_voting_period_secs: default_voting_period_secs(),
        }
    }
}

impl UpgradeConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn fallback_block_time(&self) -> Duration {
        Duration::from_millis(self.fallback_block_time_ms)
    }

    #[must_use]
    pub fn proposal_grace(&self) -> Duration {
        Duration::from_secs(self.proposal_grace_secs)
    }

    #[must_use]
    pub fn resumption_timeout(&self) -> Duration {
        Duration::from_secs(self.resumption_timeout_secs)
    }

    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    #[must_use]
    pub fn default_voting_period(&self) -> Duration {
        Duration::from_secs(self.default_voting_period_secs)
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64, // seconds
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            retries: 3,
            retry_delay: 1,
        }
    }
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_validation_timeout_secs() -> u64 {
    5
}

fn default_version_args() -> Vec<String> {
    vec!["version".to_string()]
}

fn default_auto_select_single() -> bool {
    true
}

fn default_network_type() -> String {
    "cosmos".to_string()
}

fn default_binary_name() -> String {
    "simd".to_string()
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:26657".to_string()
}

fn default_rest_url() -> String {
    "http://127.0.0.1:1317".to_string()
}

fn default_docker_image() -> String {
    "ghcr.io/cosmos/simd".to_string()
}

fn default_keyring_backend() -> String {
    "test".to_string()
}

fn default_fees() -> String {
    "5000stake".to_string()
}

fn default_deposit() -> String {
    "10000000stake".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_block_time_samples() -> u64 {
    10
}

fn default_fallback_block_time_ms() -> u64 {
    1000
}

fn default_safety_margin_blocks() -> u64 {
    10
}

fn default_safety_margin_ratio() -> f64 {
    0.2
}

fn default_proposal_grace_secs() -> u64 {
    30
}

fn default_resumption_timeout_secs() -> u64 {
    300
}

fn default_stop_grace_secs() -> u64 {
    10
}

fn default_voting_period_secs() -> u64 {
    60
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1 // 1 second
}
