//! Storage and filesystem-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StorageError {
    #[error("disk full: {path}")]
    DiskFull { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    /// Path that cannot name a cache entry or pointer target
    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("atomic rename failed: {message}")]
    AtomicRenameFailed { message: String },

    #[error("symlink creation failed: {path}: {message}")]
    SymlinkFailed { path: String, message: String },
}

impl StorageError {
    /// Convert an `io::Error` into a `StorageError` with an associated path
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::NotFound => Self::PathNotFound {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::StorageFull => Self::DiskFull {
                path: path.display().to_string(),
            },
            _ => Self::IoError {
                message: format!("{}: {}", path.display(), err),
            },
        }
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DiskFull { .. } => Some("Free up disk space under the devnet home and retry."),
            Self::PermissionDenied { .. } => {
                Some("Adjust filesystem permissions on the devnet home and retry.")
            }
            Self::AtomicRenameFailed { .. } | Self::SymlinkFailed { .. } => {
                Some("The previous active binary is untouched; retry the switch.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IoError { .. } | Self::AtomicRenameFailed { .. } | Self::SymlinkFailed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DiskFull { .. } => "storage.disk_full",
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::PathNotFound { .. } => "storage.path_not_found",
            Self::AlreadyExists { .. } => "storage.already_exists",
            Self::IoError { .. } => "storage.io_error",
            Self::InvalidPath { .. } => "storage.invalid_path",
            Self::AtomicRenameFailed { .. } => "storage.atomic_rename_failed",
            Self::SymlinkFailed { .. } => "storage.symlink_failed",
        };
        Some(code)
    }
}
