//! Platform-specific operation errors

use std::borrow::Cow;

use crate::{StorageError, UserFacingError};
use thiserror::Error;

/// Errors that can occur during platform-specific operations
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlatformError {
    #[error("filesystem operation failed: {operation} - {message}")]
    FilesystemOperationFailed { operation: String, message: String },

    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("command exited with status {code:?}: {command} - {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("process {pid} did not stop within {seconds}s")]
    StopTimeout { pid: u32, seconds: u64 },

    #[error("platform capability not available: {capability}")]
    CapabilityUnavailable { capability: String },
}

impl From<PlatformError> for StorageError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::FilesystemOperationFailed { operation, message } => {
                if operation.contains("rename") || operation.contains("atomic") {
                    StorageError::AtomicRenameFailed { message }
                } else {
                    StorageError::IoError { message }
                }
            }
            _ => StorageError::IoError {
                message: err.to_string(),
            },
        }
    }
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::FilesystemOperationFailed { .. } => "platform.filesystem_failed",
            Self::ProcessExecutionFailed { .. } => "platform.process_failed",
            Self::CommandFailed { .. } => "platform.command_failed",
            Self::CommandNotFound { .. } => "platform.command_not_found",
            Self::StopTimeout { .. } => "platform.stop_timeout",
            Self::CapabilityUnavailable { .. } => "platform.capability_unavailable",
        };
        Some(code)
    }
}
