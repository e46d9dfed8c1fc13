//! Last recorded upgrade stage, shared with the signal handler

use devnet_events::{AppEvent, EventEmitter, EventMeta, EventSender, UpgradeEvent};
use devnet_types::UpgradeStage;
use std::sync::{Arc, Mutex, PoisonError};

/// Read-only view of an orchestrator's current stage
///
/// Cloned out before the upgrade starts so a signal handler can report
/// where the devnet was left.
#[derive(Debug, Clone, Default)]
pub struct StageHandle {
    inner: Arc<Mutex<UpgradeStage>>,
}

impl StageHandle {
    #[must_use]
    pub fn get(&self) -> UpgradeStage {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Records stage transitions and announces them
///
/// Also owns the id of the current run, which every upgrade event carries
/// as its correlation id.
#[derive(Debug, Clone, Default)]
pub(crate) struct StageTracker {
    handle: StageHandle,
    run_id: Arc<Mutex<Option<String>>>,
    tx: Option<EventSender>,
}

impl EventEmitter for StageTracker {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }

    fn enrich_event_meta(&self, _event: &AppEvent, meta: &mut EventMeta) {
        let run_id = self
            .run_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(run_id) = run_id {
            meta.correlation_id = Some(run_id);
        }
        meta.labels
            .insert("stage".to_string(), self.get().as_str().to_string());
    }
}

impl StageTracker {
    pub(crate) fn new(tx: Option<EventSender>) -> Self {
        Self {
            handle: StageHandle::default(),
            run_id: Arc::default(),
            tx,
        }
    }

    pub(crate) fn handle(&self) -> StageHandle {
        self.handle.clone()
    }

    pub(crate) fn get(&self) -> UpgradeStage {
        self.handle.get()
    }

    /// Reset without announcing, at the start of a run
    pub(crate) fn reset(&self, run_id: impl Into<String>) {
        *self
            .handle
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = UpgradeStage::default();
        *self.run_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(run_id.into());
    }

    pub(crate) fn set(&self, stage: UpgradeStage) {
        {
            let mut current = self
                .handle
                .inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *current = stage;
        }
        self.emit(AppEvent::Upgrade(UpgradeEvent::StageChanged { stage }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_sees_updates() {
        let tracker = StageTracker::new(None);
        let handle = tracker.handle();
        assert_eq!(handle.get(), UpgradeStage::ResolvingTarget);

        tracker.set(UpgradeStage::AwaitingUpgradeHeight);
        assert_eq!(handle.get(), UpgradeStage::AwaitingUpgradeHeight);

        tracker.reset("upgrade-2");
        assert_eq!(handle.get(), UpgradeStage::ResolvingTarget);
    }

    #[test]
    fn test_events_carry_run_id_and_stage() {
        let (tx, mut rx) = devnet_events::channel();
        let tracker = StageTracker::new(Some(tx));
        tracker.reset("upgrade-1");
        tracker.set(UpgradeStage::PlanPrinted);

        let message = rx.try_recv().unwrap();
        assert_eq!(message.meta.correlation_id.as_deref(), Some("upgrade-1"));
        assert_eq!(
            message.meta.labels.get("stage").map(String::as_str),
            Some("plan_printed")
        );
    }

    #[test]
    fn test_separate_trackers_do_not_interfere() {
        let a = StageTracker::new(None);
        let b = StageTracker::new(None);
        a.set(UpgradeStage::ProposalSubmitted);
        assert_eq!(b.get(), UpgradeStage::ResolvingTarget);
    }
}
