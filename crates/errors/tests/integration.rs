//! Integration tests for error types

#[cfg(test)]
mod tests {
    use devnet_errors::*;

    #[test]
    fn test_error_conversion() {
        let chain_err = ChainError::Timeout {
            url: "http://127.0.0.1:26657/status".into(),
        };
        let err: Error = chain_err.into();
        assert!(matches!(err, Error::Chain(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::AllInvalid {
            found: 20,
            reasons: "timed out after 5s".into(),
        };
        assert_eq!(
            err.to_string(),
            "found 20 cached binaries but all failed validation: timed out after 5s"
        );
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err =
            StorageError::from_io_with_path(&io_err, std::path::Path::new("/tmp/devnet/bin"));
        assert!(matches!(
            storage_err,
            StorageError::PermissionDenied { ref path } if path == "/tmp/devnet/bin"
        ));
    }

    #[test]
    fn test_failure_kind_taxonomy() {
        let config: Error = UpgradeError::MissingUpgradeName.into();
        assert_eq!(config.failure_kind(), FailureKind::Configuration);

        let resolution: Error = CacheError::NoCachedBinaries {
            binary_name: "simd".into(),
        }
        .into();
        assert_eq!(resolution.failure_kind(), FailureKind::Resolution);

        let chain: Error = ChainError::VoteFailed {
            validator: "validator1".into(),
            message: "out of gas".into(),
        }
        .into();
        assert_eq!(chain.failure_kind(), FailureKind::Chain);

        let activation: Error = StorageError::AtomicRenameFailed {
            message: "EXDEV".into(),
        }
        .into();
        assert_eq!(activation.failure_kind(), FailureKind::Activation);
        assert!(activation.is_retryable());

        assert_eq!(Error::Cancelled.failure_kind(), FailureKind::Cancelled);
    }

    #[test]
    fn test_cancelled_hint_points_at_status() {
        let err = Error::Cancelled;
        assert_eq!(err.user_code(), Some("error.cancelled"));
        assert!(err.user_hint().unwrap().contains("devnet status"));
    }
}
