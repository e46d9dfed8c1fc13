//! Persisted devnet metadata

use crate::ExecutionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One validator node of the devnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    /// Node name, also used as the container name in docker mode
    pub name: String,
    /// Node home directory
    pub home: PathBuf,
    /// Key used to sign this validator's governance votes
    pub key_name: String,
    /// Process id of the running node in local mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Devnet-wide metadata stored in `devnet.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevnetMetadata {
    pub chain_id: String,
    pub network_type: String,
    pub binary_name: String,
    pub execution_mode: ExecutionMode,
    pub current_version: String,
    /// Image nodes start from in docker mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
    #[serde(default)]
    pub validators: Vec<ValidatorInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DevnetMetadata {
    /// Record a completed version change
    pub fn record_upgrade(
        &mut self,
        version: impl Into<String>,
        mode: ExecutionMode,
        image: Option<String>,
    ) {
        self.current_version = version.into();
        self.execution_mode = mode;
        if image.is_some() {
            self.docker_image = image;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_json_shape() {
        let json = r#"{
            "chain_id": "devnet-1",
            "network_type": "cosmos",
            "binary_name": "simd",
            "execution_mode": "local",
            "current_version": "v0.50.9",
            "validators": [
                {"name": "node0", "home": "/tmp/devnet/node0", "key_name": "validator0", "pid": 4242}
            ],
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        }"#;
        let mut meta: DevnetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.execution_mode, ExecutionMode::Local);
        assert_eq!(meta.validators[0].pid, Some(4242));
        assert!(meta.docker_image.is_none());

        meta.record_upgrade("v0.50.10", ExecutionMode::Local, None);
        assert_eq!(meta.current_version, "v0.50.10");
        assert!(meta.updated_at > meta.created_at);
    }
}
