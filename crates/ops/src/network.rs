//! Chain-specific knowledge: binary name, start command, images, and how
//! to invoke the chain CLI for a given execution mode

use crate::gov_params::GovParamsProvider;
use devnet_config::ChainConfig;
use devnet_platform::PlatformCommand;
use devnet_types::{is_standard_version_tag, DevnetMetadata, ExecutionMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Plugin surface for one family of chains
pub trait NetworkModule: Send + Sync {
    /// Network type, also the cache subdirectory
    fn network_type(&self) -> &str;

    fn binary_name(&self) -> &str;

    /// Arguments that start a node rooted at `home`
    fn start_args(&self, home: &Path) -> Vec<String>;

    /// Image repository nodes run from in docker mode
    fn docker_image(&self) -> &str;

    /// Image reference for a published version, if one exists
    fn image_for_version(&self, version: &str) -> Option<String> {
        is_standard_version_tag(version).then(|| format!("{}:{version}", self.docker_image()))
    }

    /// Richer governance parameter source, when this chain has one
    fn gov_params_provider(&self) -> Option<Arc<dyn GovParamsProvider>> {
        None
    }
}

/// Generic Cosmos SDK chain
#[derive(Debug, Clone)]
pub struct CosmosModule {
    network_type: String,
    binary_name: String,
    docker_image: String,
}

impl CosmosModule {
    #[must_use]
    pub fn new(
        network_type: impl Into<String>,
        binary_name: impl Into<String>,
        docker_image: impl Into<String>,
    ) -> Self {
        Self {
            network_type: network_type.into(),
            binary_name: binary_name.into(),
            docker_image: docker_image.into(),
        }
    }

    #[must_use]
    pub fn from_config(chain: &ChainConfig) -> Self {
        Self::new(&chain.network_type, &chain.binary_name, &chain.docker_image)
    }
}

impl NetworkModule for CosmosModule {
    fn network_type(&self) -> &str {
        &self.network_type
    }

    fn binary_name(&self) -> &str {
        &self.binary_name
    }

    fn start_args(&self, home: &Path) -> Vec<String> {
        vec![
            "start".to_string(),
            "--home".to_string(),
            home.display().to_string(),
        ]
    }

    fn docker_image(&self) -> &str {
        &self.docker_image
    }
}

/// How chain CLI commands are launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCli {
    /// Run a binary on the host
    Local { binary: PathBuf },
    /// Run a throwaway container from `image` with node homes mounted
    Docker { image: String },
}

impl ChainCli {
    /// Launcher for the given mode; `target` is a binary path or an image
    #[must_use]
    pub fn for_mode(mode: ExecutionMode, target: &str) -> Self {
        match mode {
            ExecutionMode::Local => Self::Local {
                binary: PathBuf::from(target),
            },
            ExecutionMode::Docker => Self::Docker {
                image: target.to_string(),
            },
        }
    }

    /// Launcher for what the devnet currently runs
    ///
    /// Local devnets go through the activation pointer at `pointer`. Docker
    /// devnets use their recorded image, or the published image for the
    /// recorded version.
    #[must_use]
    pub fn for_devnet(devnet: &DevnetMetadata, network: &dyn NetworkModule, pointer: &Path) -> Self {
        match devnet.execution_mode {
            ExecutionMode::Local => Self::Local {
                binary: pointer.to_path_buf(),
            },
            ExecutionMode::Docker => Self::Docker {
                image: devnet.docker_image.clone().unwrap_or_else(|| {
                    format!("{}:{}", network.docker_image(), devnet.current_version)
                }),
            },
        }
    }

    /// Build a command running `args`; `mounts` are host paths the command
    /// needs to see at the same location
    #[must_use]
    pub fn command<I, S>(&self, args: I, mounts: &[&Path]) -> PlatformCommand
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            Self::Local { binary } => PlatformCommand::new(binary.to_string_lossy()).args(args),
            Self::Docker { image } => {
                let mut cmd = PlatformCommand::new("docker")
                    .args(["run", "--rm", "--network", "host"]);
                for mount in mounts {
                    let path = mount.display();
                    cmd = cmd.arg("-v").arg(format!("{path}:{path}"));
                }
                cmd.arg(image).args(args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_only_for_standard_tags() {
        let module = CosmosModule::new("cosmos", "simd", "ghcr.io/cosmos/simd");
        assert_eq!(
            module.image_for_version("v0.50.10").as_deref(),
            Some("ghcr.io/cosmos/simd:v0.50.10")
        );
        assert_eq!(module.image_for_version("feature/new-gov"), None);
    }

    #[test]
    fn test_docker_cli_mounts_homes() {
        let cli = ChainCli::for_mode(ExecutionMode::Docker, "img:v1");
        let cmd = cli.command(["status"], &[Path::new("/d/node0")]);
        assert_eq!(cmd.program(), "docker");
        assert_eq!(
            cmd.get_args(),
            ["run", "--rm", "--network", "host", "-v", "/d/node0:/d/node0", "img:v1", "status"]
        );

        let cli = ChainCli::for_mode(ExecutionMode::Local, "/d/bin/simd");
        let cmd = cli.command(["status"], &[]);
        assert_eq!(cmd.program(), "/d/bin/simd");
        assert_eq!(cmd.get_args(), ["status"]);
    }
}
