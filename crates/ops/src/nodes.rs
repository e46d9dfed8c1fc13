//! Stopping and starting every validator node of a devnet

use crate::network::NetworkModule;
use async_trait::async_trait;
use devnet_errors::{Error, UpgradeError};
use devnet_platform::{CommandExecutor, PlatformCommand, ProcessHandle};
use devnet_types::{DevnetMetadata, ExecutionMode, ValidatorInfo};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What nodes start from after a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeLaunch {
    /// Local processes from this binary (normally the activation pointer)
    Binary(PathBuf),
    /// Containers from this image
    Image(String),
}

impl NodeLaunch {
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Binary(_) => ExecutionMode::Local,
            Self::Image(_) => ExecutionMode::Docker,
        }
    }
}

/// Lifecycle of all nodes in a devnet
#[async_trait]
pub trait NodeController: Send + Sync {
    /// Stop every node, using the devnet's current execution mode
    ///
    /// Clears recorded pids and returns how many nodes were stopped.
    async fn stop_all(&self, devnet: &mut DevnetMetadata) -> Result<usize, Error>;

    /// Start every node from `launch`, recording new pids
    async fn start_all(&self, devnet: &mut DevnetMetadata, launch: &NodeLaunch)
        -> Result<usize, Error>;
}

/// `NodeController` issuing processes and docker commands via `CommandExecutor`
pub struct ExecutorNodeController {
    executor: Arc<dyn CommandExecutor>,
    network: Arc<dyn NetworkModule>,
    stop_grace: Duration,
    logs_dir: PathBuf,
}

impl ExecutorNodeController {
    #[must_use]
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        network: Arc<dyn NetworkModule>,
        stop_grace: Duration,
        logs_dir: PathBuf,
    ) -> Self {
        Self {
            executor,
            network,
            stop_grace,
            logs_dir,
        }
    }

    async fn stop_process(&self, validator: &mut ValidatorInfo) -> Result<bool, Error> {
        let Some(pid) = validator.pid.take() else {
            return Ok(false);
        };
        let handle = ProcessHandle {
            pid,
            name: validator.name.clone(),
        };
        if !self.executor.is_running(&handle).await {
            return Ok(false);
        }
        self.executor.stop(&handle, self.stop_grace).await?;
        Ok(true)
    }

    async fn stop_container(&self, validator: &ValidatorInfo) -> Result<bool, Error> {
        let grace = self.stop_grace.as_secs().to_string();
        let stop = PlatformCommand::new("docker").args([
            "stop",
            "-t",
            grace.as_str(),
            validator.name.as_str(),
        ]);
        let stopped = self.executor.run(&stop).await?.success();

        // Containers are recreated on start; a missing one is fine here
        let rm = PlatformCommand::new("docker").args(["rm", "-f", validator.name.as_str()]);
        let _ = self.executor.run(&rm).await;
        Ok(stopped)
    }

    async fn start_process(
        &self,
        validator: &mut ValidatorInfo,
        binary: &std::path::Path,
    ) -> Result<(), Error> {
        devnet_platform::fs::create_dir_all(&self.logs_dir).await?;
        let cmd = PlatformCommand::new(binary.to_string_lossy())
            .args(self.network.start_args(&validator.home))
            .log_file(self.logs_dir.join(format!("{}.log", validator.name)));
        let handle = self.executor.start(&validator.name, &cmd).await?;
        validator.pid = Some(handle.pid);
        Ok(())
    }

    async fn start_container(&self, validator: &mut ValidatorInfo, image: &str) -> Result<(), Error> {
        let home = validator.home.display().to_string();
        let mount = format!("{home}:{home}");
        let cmd = PlatformCommand::new("docker")
            .args([
                "run",
                "-d",
                "--name",
                validator.name.as_str(),
                "--network",
                "host",
                "-v",
                mount.as_str(),
                image,
            ])
            .args(self.network.start_args(&validator.home));
        self.executor.run(&cmd).await?.into_success(&cmd)?;
        validator.pid = None;
        Ok(())
    }
}

#[async_trait]
impl NodeController for ExecutorNodeController {
    async fn stop_all(&self, devnet: &mut DevnetMetadata) -> Result<usize, Error> {
        let mode = devnet.execution_mode;
        let mut stopped = 0;
        for validator in &mut devnet.validators {
            let result = match mode {
                ExecutionMode::Local => self.stop_process(validator).await,
                ExecutionMode::Docker => self.stop_container(validator).await,
            };
            match result {
                Ok(true) => stopped += 1,
                Ok(false) => {
                    tracing::debug!(node = %validator.name, "node was not running");
                }
                Err(e) => {
                    return Err(UpgradeError::StopFailed {
                        message: format!("{}: {e}", validator.name),
                    }
                    .into())
                }
            }
        }
        Ok(stopped)
    }

    async fn start_all(
        &self,
        devnet: &mut DevnetMetadata,
        launch: &NodeLaunch,
    ) -> Result<usize, Error> {
        for validator in &mut devnet.validators {
            let result = match launch {
                NodeLaunch::Binary(binary) => self.start_process(validator, binary).await,
                NodeLaunch::Image(image) => self.start_container(validator, image).await,
            };
            result.map_err(|e| UpgradeError::StartFailed {
                message: format!("{}: {e}", validator.name),
            })?;
        }
        Ok(devnet.validators.len())
    }
}
