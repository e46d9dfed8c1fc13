#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Binary cache for devnet
//!
//! This crate manages `home/cache/binaries/{network}/{commit}-{config}/`,
//! where every built or downloaded node binary is stored once under its
//! cache key together with a `metadata.json`. Entries are write-once:
//! storing an existing key is a successful no-op, which makes concurrent
//! builds of the same ref safe.

pub mod metadata_io;
pub mod scanner;
pub mod validator;

pub use metadata_io::{read_entry_metadata, write_entry_metadata, EntryMetadata};
pub use scanner::{scan_all_networks, scan_cached_binaries, ScanReport, SkippedEntry};
pub use validator::{sort_by_recency, summarize_failures, BinaryValidator, BuildIdentity};

use chrono::{DateTime, Utc};
use devnet_config::constants::CACHE_METADATA_FILE;
use devnet_errors::{CacheError, Error, StorageError};
use devnet_platform::fs as pfs;
use devnet_types::{is_valid_cache_key, CacheKey, CachedBinaryMetadata, ConfigHash};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a new cache entry was built from
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub commit_hash: String,
    pub config_hash: ConfigHash,
    /// Branch, tag or commit originally requested
    pub git_ref: String,
    pub build_time: DateTime<Utc>,
}

/// Cache of built binaries for one network and binary name
#[derive(Debug, Clone)]
pub struct BinaryCache {
    root: PathBuf,
    network_type: String,
    binary_name: String,
}

impl BinaryCache {
    /// Create a cache rooted at `root` (normally `home/cache/binaries`)
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        network_type: impl Into<String>,
        binary_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            network_type: network_type.into(),
            binary_name: binary_name.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn network_type(&self) -> &str {
        &self.network_type
    }

    #[must_use]
    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Directory holding this cache's entries
    #[must_use]
    pub fn network_dir(&self) -> PathBuf {
        self.root.join(&self.network_type)
    }

    /// Directory of one entry
    #[must_use]
    pub fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.network_dir().join(key.to_string())
    }

    /// Absolute path of the binary file for `key`
    #[must_use]
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.entry_dir(key).join(&self.binary_name)
    }

    /// Whether an entry with a binary exists for `key`
    pub async fn exists(&self, key: &CacheKey) -> bool {
        tokio::fs::metadata(self.path(key))
            .await
            .is_ok_and(|m| m.is_file())
    }

    /// Format check for a serialized key; performs no I/O
    #[must_use]
    pub fn is_valid_key(value: &str) -> bool {
        is_valid_cache_key(value)
    }

    /// Copy `binary_path` into the cache under the key derived from `info`
    ///
    /// The entry is assembled in a staging directory and renamed into place.
    /// If the key already exists, or another writer wins the rename, the
    /// existing entry is kept and its key returned.
    ///
    /// # Errors
    /// Returns an error if the commit hash is malformed or the copy fails.
    pub async fn store(&self, binary_path: &Path, info: &BuildInfo) -> Result<CacheKey, Error> {
        let key = CacheKey::new(&info.commit_hash, info.config_hash.clone())?;
        if self.exists(&key).await {
            tracing::debug!(cache_key = %key, "cache entry already present");
            return Ok(key);
        }

        let network_dir = self.network_dir();
        pfs::create_dir_all(&network_dir).await?;

        let staging = network_dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let result = self.stage_entry(&staging, binary_path, &key, info).await;
        let result = match result {
            Ok(()) => self.commit_entry(&staging, &key).await,
            Err(e) => Err(e),
        };

        // The staging directory is gone after a successful rename
        let _ = pfs::remove_dir_all(&staging).await;
        result.map(|()| key)
    }

    async fn stage_entry(
        &self,
        staging: &Path,
        binary_path: &Path,
        key: &CacheKey,
        info: &BuildInfo,
    ) -> Result<(), Error> {
        pfs::create_dir_all(staging).await?;

        let staged_binary = staging.join(&self.binary_name);
        let size_bytes = pfs::copy_file(binary_path, &staged_binary).await?;
        pfs::set_executable(&staged_binary).await?;

        let metadata = EntryMetadata {
            commit_hash: key.commit_hash().to_string(),
            config_hash: key.config_hash().clone(),
            git_ref: info.git_ref.clone(),
            build_time: info.build_time,
            size_bytes,
            network_type: self.network_type.clone(),
        };
        write_entry_metadata(&staging.join(CACHE_METADATA_FILE), &metadata).await
    }

    async fn commit_entry(&self, staging: &Path, key: &CacheKey) -> Result<(), Error> {
        let dest = self.entry_dir(key);
        match tokio::fs::rename(staging, &dest).await {
            Ok(()) => Ok(()),
            // Another writer stored the same key first; entries are immutable
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::AlreadyExists | std::io::ErrorKind::DirectoryNotEmpty
                ) && self.exists(key).await =>
            {
                Ok(())
            }
            Err(e) => Err(StorageError::AtomicRenameFailed {
                message: format!("failed to move entry into cache: {e}"),
            }
            .into()),
        }
    }

    /// Keys of every entry directory in this network
    ///
    /// # Errors
    /// Returns an error if the network directory exists but cannot be listed.
    pub async fn list_keys(&self) -> Result<Vec<CacheKey>, Error> {
        let network_dir = self.network_dir();
        let mut entries = match tokio::fs::read_dir(&network_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io_with_path(&e, &network_dir)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &network_dir))?
        {
            if let Ok(key) = CacheKey::parse(&entry.file_name().to_string_lossy()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Remove one entry
    ///
    /// # Errors
    /// Returns `EntryNotFound` if the entry does not exist.
    pub async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        let dir = self.entry_dir(key);
        if !pfs::exists(&dir).await {
            return Err(CacheError::EntryNotFound {
                key: key.to_string(),
            }
            .into());
        }
        pfs::remove_dir_all(&dir).await
    }

    /// Remove every entry not listed in `keep`, returning what was removed
    ///
    /// # Errors
    /// Returns an error if listing or removal fails.
    pub async fn clean(&self, keep: &[CacheKey]) -> Result<Vec<CacheKey>, Error> {
        let mut removed = Vec::new();
        for key in self.list_keys().await? {
            if !keep.contains(&key) {
                self.remove(&key).await?;
                removed.push(key);
            }
        }
        Ok(removed)
    }

    /// Scan this network's entries without validating them
    ///
    /// # Errors
    /// Returns an error if the scan is cancelled or the directory unreadable.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<ScanReport, Error> {
        scan_cached_binaries(cancel, &self.root, &self.network_type, &self.binary_name).await
    }

    /// Most recent entry whose commit starts with `commit` (at least 7 hex chars)
    ///
    /// # Errors
    /// Returns an error if the prefix is malformed or scanning fails.
    pub async fn find_by_commit(
        &self,
        cancel: &CancellationToken,
        commit: &str,
    ) -> Result<Option<CachedBinaryMetadata>, Error> {
        let prefix = commit.to_ascii_lowercase();
        if prefix.len() < 7 || prefix.len() > 40 || !prefix.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(CacheError::InvalidCommitHash {
                value: commit.to_string(),
            }
            .into());
        }
        let mut binaries = self.scan(cancel).await?.binaries;
        binaries.retain(|b| b.commit_hash.starts_with(&prefix));
        sort_by_recency(&mut binaries);
        Ok(binaries.into_iter().next())
    }

    /// Most recent entry built from `git_ref`
    ///
    /// # Errors
    /// Returns an error if scanning fails.
    pub async fn find_by_ref(
        &self,
        cancel: &CancellationToken,
        git_ref: &str,
    ) -> Result<Option<CachedBinaryMetadata>, Error> {
        let mut binaries = self.scan(cancel).await?.binaries;
        binaries.retain(|b| b.git_ref == git_ref);
        sort_by_recency(&mut binaries);
        Ok(binaries.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COMMIT: &str = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2";

    fn build_info(commit: &str, git_ref: &str) -> BuildInfo {
        BuildInfo {
            commit_hash: commit.to_string(),
            config_hash: ConfigHash::from_build_settings(&[("ledger", "false")]),
            git_ref: git_ref.to_string(),
            build_time: Utc::now(),
        }
    }

    async fn fake_binary(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("built-simd");
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_store_lays_out_entry() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryCache::new(temp.path().join("cache/binaries"), "cosmos", "simd");
        let source = fake_binary(temp.path(), "#!/bin/sh\necho v1\n").await;

        let key = cache.store(&source, &build_info(COMMIT, "main")).await.unwrap();

        assert!(cache.exists(&key).await);
        let expected = temp
            .path()
            .join("cache/binaries/cosmos")
            .join(key.to_string())
            .join("simd");
        assert_eq!(cache.path(&key), expected);
        assert!(pfs::is_executable_file(&expected).await);

        let meta = read_entry_metadata(&cache.entry_dir(&key).join(CACHE_METADATA_FILE))
            .await
            .unwrap();
        assert_eq!(meta.git_ref, "main");
        assert_eq!(meta.network_type, "cosmos");
        assert_eq!(meta.size_bytes, 18);
        assert_eq!(cache.list_keys().await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_store_is_write_once() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryCache::new(temp.path().join("cache"), "cosmos", "simd");
        let first = fake_binary(temp.path(), "first").await;
        let key = cache.store(&first, &build_info(COMMIT, "main")).await.unwrap();

        let second = fake_binary(temp.path(), "second, different contents").await;
        let again = cache.store(&second, &build_info(COMMIT, "main")).await.unwrap();

        assert_eq!(key, again);
        let stored = tokio::fs::read_to_string(cache.path(&key)).await.unwrap();
        assert_eq!(stored, "first");
    }

    #[tokio::test]
    async fn test_concurrent_stores_of_same_key() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryCache::new(temp.path().join("cache"), "cosmos", "simd");
        let source = fake_binary(temp.path(), "#!/bin/sh\n").await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let source = source.clone();
            tasks.spawn(async move { cache.store(&source, &build_info(COMMIT, "main")).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(cache.list_keys().await.unwrap().len(), 1);
        // No staging directories left behind
        let mut entries = tokio::fs::read_dir(cache.network_dir()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_store_rejects_bad_commit() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryCache::new(temp.path(), "cosmos", "simd");
        let source = fake_binary(temp.path(), "x").await;
        let err = cache
            .store(&source, &build_info("not-a-commit", "main"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Cache(CacheError::InvalidCommitHash { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_and_clean() {
        let temp = TempDir::new().unwrap();
        let cache = BinaryCache::new(temp.path().join("cache"), "cosmos", "simd");
        let source = fake_binary(temp.path(), "x").await;
        let other = "ffffffffffffffffffffffffffffffffffffffff";

        let keep = cache.store(&source, &build_info(COMMIT, "v0.50.1")).await.unwrap();
        let drop_key = cache.store(&source, &build_info(other, "main")).await.unwrap();

        let cancel = CancellationToken::new();
        let found = cache.find_by_commit(&cancel, &COMMIT[..10]).await.unwrap();
        assert_eq!(found.unwrap().commit_hash, COMMIT);
        let by_ref = cache.find_by_ref(&cancel, "main").await.unwrap();
        assert_eq!(by_ref.unwrap().commit_hash, other);
        assert!(cache.find_by_commit(&cancel, "abc").await.is_err());

        let removed = cache.clean(std::slice::from_ref(&keep)).await.unwrap();
        assert_eq!(removed, vec![drop_key.clone()]);
        assert!(cache.exists(&keep).await);
        assert!(matches!(
            cache.remove(&drop_key).await,
            Err(Error::Cache(CacheError::EntryNotFound { .. }))
        ));
    }
}
