//! System setup and initialization

use crate::error::CliError;
use devnet_config::Config;
use tracing::{debug, info};

/// Prepares the devnet home before any command runs
pub struct SystemSetup {
    config: Config,
}

impl SystemSetup {
    /// Create new system setup
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Initialize the home directory layout
    pub async fn initialize(&self) -> Result<(), CliError> {
        info!(home = %self.config.home().display(), "Initializing devnet home");
        self.ensure_system_directories().await?;
        Ok(())
    }

    /// Ensure required directories exist under the home
    async fn ensure_system_directories(&self) -> Result<(), CliError> {
        let required_dirs = [
            self.config.home(),
            self.config.cache_root(),
            self.config.bin_dir(),
            self.config.exports_dir(),
            self.config.logs_dir(),
        ];

        for dir in &required_dirs {
            if !devnet_platform::fs::exists(dir).await {
                debug!("Creating directory: {}", dir.display());
                devnet_platform::fs::create_dir_all(dir).await.map_err(|e| {
                    CliError::Setup(format!("Failed to create {}: {e}", dir.display()))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_creates_layout() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.home = Some(temp.path().join("home"));

        SystemSetup::new(config.clone()).initialize().await.unwrap();

        assert!(config.cache_root().is_dir());
        assert!(config.bin_dir().is_dir());
        assert!(config.exports_dir().is_dir());
        assert!(config.logs_dir().is_dir());

        // Second run is a no-op
        SystemSetup::new(config).initialize().await.unwrap();
    }
}
