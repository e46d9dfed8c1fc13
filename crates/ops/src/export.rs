//! Genesis snapshots taken around a binary switch

use crate::network::ChainCli;
use async_trait::async_trait;
use devnet_errors::{Error, UpgradeError};
use devnet_platform::CommandExecutor;
use devnet_types::DevnetMetadata;
use std::path::PathBuf;
use std::sync::Arc;

/// Writes the chain state of a stopped devnet as a genesis file
#[async_trait]
pub trait GenesisExporter: Send + Sync {
    /// Export using `cli` and return the written file
    async fn export(
        &self,
        devnet: &DevnetMetadata,
        cli: &ChainCli,
        label: &str,
    ) -> Result<PathBuf, Error>;
}

/// Exports through the chain binary's `export` command
pub struct CliGenesisExporter {
    executor: Arc<dyn CommandExecutor>,
    exports_dir: PathBuf,
}

impl CliGenesisExporter {
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>, exports_dir: PathBuf) -> Self {
        Self {
            executor,
            exports_dir,
        }
    }
}

#[async_trait]
impl GenesisExporter for CliGenesisExporter {
    async fn export(
        &self,
        devnet: &DevnetMetadata,
        cli: &ChainCli,
        label: &str,
    ) -> Result<PathBuf, Error> {
        let node = devnet.validators.first().ok_or(UpgradeError::NoValidators)?;
        devnet_platform::fs::create_dir_all(&self.exports_dir).await?;

        let path = self.exports_dir.join(format!(
            "{label}-genesis-{}.json",
            chrono::Utc::now().timestamp()
        ));
        let home = node.home.display().to_string();
        let output_doc = path.display().to_string();
        let cmd = cli.command(
            ["export", "--home", home.as_str(), "--output-document", output_doc.as_str()],
            &[node.home.as_path(), self.exports_dir.as_path()],
        );

        let output = self.executor.run(&cmd).await?;
        if !output.success() {
            return Err(UpgradeError::ExportFailed {
                message: output.stderr_str().lines().last().unwrap_or("").to_string(),
            }
            .into());
        }
        if !devnet_platform::fs::exists(&path).await {
            return Err(UpgradeError::ExportFailed {
                message: format!("{} was not written", path.display()),
            }
            .into());
        }
        Ok(path)
    }
}
