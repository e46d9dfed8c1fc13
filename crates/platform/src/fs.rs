//! Filesystem convenience helpers
//!
//! Thin async wrappers returning `devnet_errors::Error` with the path that
//! failed attached, so callers can propagate with `?`.

use devnet_errors::{Error, StorageError};
use std::path::Path;
use tokio::fs;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, Error>;

fn storage_err(err: &std::io::Error, path: &Path) -> Error {
    StorageError::from_io_with_path(err, path).into()
}

/// Check if a path exists; dangling symlinks count as existing
pub async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Create a directory with all parent directories
///
/// # Errors
///
/// Returns an error if permission is denied or any I/O operation fails.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| storage_err(&e, path))
}

/// Remove a directory tree
///
/// # Errors
///
/// Returns an error if the removal fails for any reason other than the
/// directory already being absent.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_err(&e, path)),
    }
}

/// Remove a single file or symlink
///
/// # Errors
///
/// Returns an error if the removal fails for any reason other than the file
/// already being absent.
pub async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_err(&e, path)),
    }
}

/// Atomically rename `src` over `dst`
///
/// Both paths must be on the same filesystem. Readers of `dst` observe either
/// the old or the new entry, never neither.
///
/// # Errors
///
/// Returns `AtomicRenameFailed` if the rename fails.
pub async fn atomic_rename(src: &Path, dst: &Path) -> Result<()> {
    fs::rename(src, dst).await.map_err(|e| {
        StorageError::AtomicRenameFailed {
            message: format!("{} -> {}: {e}", src.display(), dst.display()),
        }
        .into()
    })
}

/// Create a symbolic link at `link` pointing to `target`
///
/// Fails if anything already exists at `link`.
///
/// # Errors
///
/// Returns `SymlinkFailed` if the link cannot be created.
#[cfg(unix)]
pub async fn symlink(target: &Path, link: &Path) -> Result<()> {
    fs::symlink(target, link).await.map_err(|e| {
        StorageError::SymlinkFailed {
            path: link.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Create a symbolic link (not supported on non-Unix platforms).
#[cfg(not(unix))]
pub async fn symlink(_target: &Path, link: &Path) -> Result<()> {
    Err(StorageError::SymlinkFailed {
        path: link.display().to_string(),
        message: "symlinks are not supported on this platform".to_string(),
    }
    .into())
}

/// Copy a single file, returning the number of bytes copied
///
/// # Errors
///
/// Returns an error if the source cannot be read or the destination written.
pub async fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    fs::copy(src, dst).await.map_err(|e| storage_err(&e, src))
}

/// Mark a file executable (`0o755`)
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(unix)]
pub async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| storage_err(&e, path))
}

#[cfg(not(unix))]
pub async fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Whether `path` is a regular file with an executable bit set
pub async fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path).await else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Read a symlink's stored target without resolving it
///
/// # Errors
///
/// Returns an error if `path` does not exist or is not a symlink.
pub async fn read_link(path: &Path) -> Result<std::path::PathBuf> {
    fs::read_link(path).await.map_err(|e| storage_err(&e, path))
}

/// Get the size of a file
///
/// # Errors
///
/// Returns an error if reading file metadata fails.
pub async fn size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|e| storage_err(&e, path))
}

/// Write `contents` to `path` through a temporary sibling and a rename
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StorageError::InvalidPath {
            path: path.display().to_string(),
        })?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));

    if let Err(e) = fs::write(&tmp, contents).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(storage_err(&e, &tmp));
    }
    if let Err(e) = atomic_rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_symlink_and_read_link() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        tokio::fs::write(&target, b"x").await.unwrap();
        let link = dir.path().join("link");

        symlink(Path::new("target"), &link).await.unwrap();
        assert_eq!(read_link(&link).await.unwrap(), Path::new("target"));
        assert!(symlink(Path::new("target"), &link).await.is_err());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("devnet.json");
        write_atomic(&path, b"{\"a\":1}").await.unwrap();
        write_atomic(&path, b"{\"a\":2}").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{\"a\":2}");

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_set_executable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("simd");
        tokio::fs::write(&path, b"#!/bin/sh\n").await.unwrap();
        assert!(!is_executable_file(&path).await);
        set_executable(&path).await.unwrap();
        assert!(is_executable_file(&path).await);
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        remove_file(&dir.path().join("absent")).await.unwrap();
        remove_dir_all(&dir.path().join("absent-dir")).await.unwrap();
    }
}
