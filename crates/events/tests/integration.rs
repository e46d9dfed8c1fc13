//! Integration tests for events

#[cfg(test)]
mod tests {
    use devnet_errors::{CacheError, UserFacingError};
    use devnet_events::*;
    use devnet_types::UpgradeStage;

    #[tokio::test]
    async fn test_emit_wraps_event_with_meta() {
        let (tx, mut rx) = channel();

        tx.emit_warning("binary skipped");
        tx.emit(AppEvent::Upgrade(UpgradeEvent::StageChanged {
            stage: UpgradeStage::ProposalSubmitted,
        }));

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Warning { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Warn);
        assert_eq!(first.meta.source, EventSource::GENERAL);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.meta.source.as_str(), "upgrade");
        assert_eq!(second.meta.level, EventLevel::Info);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[test]
    fn test_missing_sender_is_silent() {
        let none: Option<EventSender> = None;
        none.emit_error_with_details("nobody listening", "no sender");
    }

    #[test]
    fn test_failure_context_from_error() {
        let err = CacheError::NoCachedBinaries {
            binary_name: "simd".into(),
        };
        let ctx = FailureContext::from_error(&err);
        assert_eq!(ctx.code.as_deref(), err.user_code());
        assert!(!ctx.retryable);

        let json = serde_json::to_value(AppEvent::Upgrade(UpgradeEvent::Failed {
            stage: UpgradeStage::ResolvingTarget,
            failure: ctx,
        }))
        .unwrap();
        assert_eq!(json["domain"], "upgrade");
        assert_eq!(json["event"]["type"], "failed");
        assert_eq!(json["event"]["stage"], "resolving_target");
    }
}
