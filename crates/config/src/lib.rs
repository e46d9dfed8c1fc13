#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for devnet
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/devnet/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;
pub mod sections;

pub use sections::{
    CacheConfig, ChainConfig, GeneralConfig, NetworkConfig, PathConfig, UpgradeConfig,
};

use devnet_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub upgrade: UpgradeConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("devnet").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if fs::try_exists(&config_path).await.unwrap_or(false) {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(home) = std::env::var("DEVNET_HOME") {
            if home.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "DEVNET_HOME".to_string(),
                    value: home,
                }
                .into());
            }
            self.paths.home = Some(PathBuf::from(home));
        }

        if let Ok(url) = std::env::var("DEVNET_RPC_URL") {
            self.chain.rpc_url = parse_url("DEVNET_RPC_URL", url)?;
        }

        if let Ok(url) = std::env::var("DEVNET_REST_URL") {
            self.chain.rest_url = parse_url("DEVNET_REST_URL", url)?;
        }

        if let Ok(network) = std::env::var("DEVNET_NETWORK") {
            self.chain.network_type = network;
        }

        if let Ok(binary) = std::env::var("DEVNET_BINARY") {
            self.chain.binary_name = binary;
        }

        self.validate()
    }

    /// Check values that serde accepts but the toolchain cannot use
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.cache.validation_timeout_secs == 0 {
            return Err(invalid("cache.validation_timeout_secs", "0"));
        }
        if self.upgrade.block_time_samples == 0 {
            return Err(invalid("upgrade.block_time_samples", "0"));
        }
        if self.upgrade.poll_interval_ms == 0 {
            return Err(invalid("upgrade.poll_interval_ms", "0"));
        }
        if !(0.0..=10.0).contains(&self.upgrade.safety_margin_ratio) {
            return Err(invalid(
                "upgrade.safety_margin_ratio",
                self.upgrade.safety_margin_ratio.to_string(),
            ));
        }
        if self.chain.binary_name.is_empty() || self.chain.binary_name.contains('/') {
            return Err(invalid("chain.binary_name", self.chain.binary_name.clone()));
        }
        Ok(())
    }

    /// Devnet home directory (with default)
    #[must_use]
    pub fn home(&self) -> PathBuf {
        self.paths.home.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(constants::DEFAULT_HOME_DIR)
        })
    }

    /// Root of the binary cache
    #[must_use]
    pub fn cache_root(&self) -> PathBuf {
        self.home().join(constants::CACHE_BINARIES_DIR)
    }

    /// Directory holding active binary pointers
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.home().join(constants::BIN_DIR)
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.home().join(constants::DEVNET_METADATA_FILE)
    }

    #[must_use]
    pub fn exports_dir(&self) -> PathBuf {
        self.home().join(constants::EXPORTS_DIR)
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.home().join(constants::LOGS_DIR)
    }
}

fn parse_url(field: &str, value: String) -> Result<String, Error> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(invalid(field, value))
    }
}

fn invalid(field: &str, value: impl Into<String>) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
    }
    .into()
}
