//! The active binary pointer.
//!
//! `bin/{binary_name}` is a symbolic link with a target relative to `bin/`,
//! normally `../cache/binaries/{network}/{key}/{binary_name}`. A switch
//! creates a fresh link beside the pointer and renames it over the old one,
//! so a node starting concurrently sees either the old or the new target and
//! never a missing one.

use devnet_errors::{CacheError, Error};
use devnet_events::{AppEvent, CacheEvent, EventEmitter, EventSender};
use devnet_platform::fs;
use devnet_store::{BinaryCache, BuildInfo};
use devnet_types::{is_valid_cache_key, ActiveSymlink, CacheKey, COMMIT_HASH_LEN};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Manages the active binary pointer for one binary name
#[derive(Debug, Clone)]
pub struct ActivationManager {
    bin_dir: PathBuf,
    binary_name: String,
    tx: Option<EventSender>,
}

impl EventEmitter for ActivationManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl ActivationManager {
    #[must_use]
    pub fn new(bin_dir: impl Into<PathBuf>, binary_name: impl Into<String>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            binary_name: binary_name.into(),
            tx: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Location of the pointer, `bin/{binary_name}`
    #[must_use]
    pub fn pointer_path(&self) -> PathBuf {
        self.bin_dir.join(&self.binary_name)
    }

    /// The current activation, or `None` if nothing was ever activated
    ///
    /// A plain file at the pointer location (a devnet created before the
    /// cache existed) is not an activation; see [`Self::has_plain_binary`].
    ///
    /// # Errors
    /// Returns an error if the pointer exists but cannot be read.
    pub async fn current(&self) -> Result<Option<ActiveSymlink>, Error> {
        let path = self.pointer_path();
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.file_type().is_symlink() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(&e, &path)),
        }

        let target = fs::read_link(&path).await?;
        let commit_hash = commit_from_target(&target);
        Ok(Some(ActiveSymlink {
            path,
            target,
            commit_hash,
        }))
    }

    /// Whether the pointer location holds a regular file instead of a link
    pub async fn has_plain_binary(&self) -> bool {
        tokio::fs::symlink_metadata(self.pointer_path())
            .await
            .is_ok_and(|m| m.file_type().is_file())
    }

    /// Point the active binary at `target`
    ///
    /// Relative targets are resolved against the pointer's directory. The
    /// previous activation stays in place if anything fails.
    ///
    /// # Errors
    /// Returns `MissingTarget` if `target` does not exist, or a storage error
    /// if the link cannot be created or renamed into place.
    pub async fn switch(&self, target: &Path) -> Result<(), Error> {
        // `..` in a relative target only resolves once the directory exists
        fs::create_dir_all(&self.bin_dir).await?;
        let resolved = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.bin_dir.join(target)
        };
        if !tokio::fs::metadata(&resolved).await.is_ok_and(|m| m.is_file()) {
            return Err(CacheError::MissingTarget {
                path: resolved.display().to_string(),
            }
            .into());
        }

        let previous = self.current().await.ok().flatten().map(|s| s.target);

        let pointer = self.pointer_path();
        let temp = self
            .bin_dir
            .join(format!(".{}.tmp-{}", self.binary_name, Uuid::new_v4()));

        let result = match fs::symlink(target, &temp).await {
            Ok(()) => fs::atomic_rename(&temp, &pointer).await,
            Err(e) => Err(e),
        };
        // Gone already when the rename succeeded
        let _ = fs::remove_file(&temp).await;
        result?;

        tracing::debug!(pointer = %pointer.display(), target = %target.display(), "activated binary");
        self.emit(AppEvent::Cache(CacheEvent::Activated {
            binary_name: self.binary_name.clone(),
            target: target.to_path_buf(),
            previous,
        }));
        Ok(())
    }

    /// Activate a cached entry by its key
    ///
    /// # Errors
    /// Returns an error if the entry is missing or the switch fails.
    pub async fn switch_to_key(&self, cache: &BinaryCache, key: &CacheKey) -> Result<(), Error> {
        let target = relative_path(&self.bin_dir, &cache.path(key));
        self.switch(&target).await
    }

    /// Activate the most recent cached entry for `commit` (full hash or prefix)
    ///
    /// # Errors
    /// Returns `CommitNotCached` if no entry matches, or an error if the
    /// switch fails.
    pub async fn switch_to_cache(
        &self,
        cancel: &CancellationToken,
        cache: &BinaryCache,
        commit: &str,
    ) -> Result<CacheKey, Error> {
        let entry = cache
            .find_by_commit(cancel, commit)
            .await?
            .ok_or_else(|| CacheError::CommitNotCached {
                commit: commit.to_string(),
            })?;
        let key = entry.cache_key()?;
        self.switch_to_key(cache, &key).await?;
        Ok(key)
    }

    /// Move a plain binary at the pointer location into the cache
    ///
    /// The binary is stored first; the new link is then renamed over the
    /// plain file, which removes it in the same step. Nothing changes if the
    /// pointer is already a link.
    ///
    /// # Errors
    /// Returns an error if storing or switching fails.
    pub async fn migrate_to_symlink(
        &self,
        cache: &BinaryCache,
        info: &BuildInfo,
    ) -> Result<Option<CacheKey>, Error> {
        if !self.has_plain_binary().await {
            return Ok(None);
        }

        let key = cache.store(&self.pointer_path(), info).await?;
        self.switch_to_key(cache, &key).await?;

        self.emit(AppEvent::Cache(CacheEvent::Migrated {
            binary_name: self.binary_name.clone(),
            cache_key: key.to_string(),
        }));
        Ok(Some(key))
    }
}

/// Commit hash from the first cache key component of a link target
fn commit_from_target(target: &Path) -> Option<String> {
    target.components().find_map(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            is_valid_cache_key(&name).then(|| name[..COMMIT_HASH_LEN].to_ascii_lowercase())
        }
        _ => None,
    })
}

/// Path of `to` relative to the directory `from_dir`
///
/// Falls back to `to` itself when the two share no leading component.
fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let dest: Vec<Component<'_>> = to.components().collect();
    let common = from
        .iter()
        .zip(&dest)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return to.to_path_buf();
    }

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &dest[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let rel = relative_path(
            Path::new("/home/u/.devnet/bin"),
            Path::new("/home/u/.devnet/cache/binaries/cosmos/k/simd"),
        );
        assert_eq!(rel, PathBuf::from("../cache/binaries/cosmos/k/simd"));

        let rel = relative_path(Path::new("bin"), Path::new("/abs/simd"));
        assert_eq!(rel, PathBuf::from("/abs/simd"));
    }

    #[test]
    fn test_commit_from_target() {
        let commit = "ab".repeat(20);
        let target = PathBuf::from(format!("../cache/binaries/cosmos/{commit}-deadbeef/simd"));
        assert_eq!(commit_from_target(&target), Some(commit));
        assert_eq!(commit_from_target(Path::new("/usr/local/bin/simd")), None);
    }
}
