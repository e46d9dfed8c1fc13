//! Devnet metadata persistence

use async_trait::async_trait;
use devnet_errors::{Error, UpgradeError};
use devnet_types::DevnetMetadata;
use std::path::{Path, PathBuf};

/// Load/save contract for devnet metadata
#[async_trait]
pub trait DevnetRepository: Send + Sync {
    /// Load the current metadata
    async fn load(&self) -> Result<DevnetMetadata, Error>;

    /// Replace the stored metadata
    async fn save(&self, metadata: &DevnetMetadata) -> Result<(), Error>;
}

/// Metadata stored as JSON in `home/devnet.json`
#[derive(Debug, Clone)]
pub struct FileDevnetRepository {
    path: PathBuf,
}

impl FileDevnetRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a devnet has been created at this location
    pub async fn exists(&self) -> bool {
        devnet_platform::fs::exists(&self.path).await
    }
}

#[async_trait]
impl DevnetRepository for FileDevnetRepository {
    async fn load(&self) -> Result<DevnetMetadata, Error> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UpgradeError::MetadataNotFound {
                    path: self.path.display().to_string(),
                }
                .into())
            }
            Err(e) => return Err(Error::io_with_path(&e, &self.path)),
        };
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, metadata: &DevnetMetadata) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            devnet_platform::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(metadata)?;
        devnet_platform::fs::write_atomic(&self.path, &content).await
    }
}
