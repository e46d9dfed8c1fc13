#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in devnet
//!
//! Library crates never print or decide how a message is shown. They emit
//! domain events over an unbounded channel; the CLI drains the channel,
//! forwards each event to `tracing` and renders progress for the operator.
//!
//! ## Architecture
//!
//! - **Domain-driven events**: `General`, `Cache` and `Upgrade`
//! - **Unified `EventEmitter` trait**: single API for raw senders and structs holding one
//! - **Event metadata**: every emission carries an id, timestamp, level and source

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{AppEvent, CacheEvent, FailureContext, GeneralEvent, UpgradeEvent};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// An event together with its emission metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

impl EventMessage {
    #[must_use]
    pub fn new(meta: EventMeta, event: AppEvent) -> Self {
        Self { meta, event }
    }

    /// Wrap an event with metadata derived from the event itself
    #[must_use]
    pub fn from_event(event: AppEvent) -> Self {
        let level = EventLevel::from(event.log_level());
        let meta = EventMeta::new(level, event.event_source());
        Self { meta, event }
    }
}

/// Sending half of the event channel
pub type EventSender = UnboundedSender<EventMessage>;

/// Receiving half of the event channel
pub type EventReceiver = UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout devnet
///
/// Implemented by the raw `EventSender` and by any struct that carries one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Hook for adding labels or correlation ids before a message is sent
    fn enrich_event_meta(&self, _event: &AppEvent, _meta: &mut EventMeta) {}

    /// Emit an event with explicit metadata
    fn emit_with_meta(&self, meta: EventMeta, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(EventMessage::new(meta, event));
        }
    }

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        let level = EventLevel::from(event.log_level());
        let mut meta = EventMeta::new(level, event.event_source());
        self.enrich_event_meta(&event, &mut meta);
        self.emit_with_meta(meta, event);
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a debug log event with context
    fn emit_debug_with_context(
        &self,
        message: impl Into<String>,
        context: std::collections::BTreeMap<String, String>,
    ) {
        self.emit(AppEvent::General(GeneralEvent::debug_with_context(
            message, context,
        )));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event with details
    fn emit_error_with_details(&self, message: impl Into<String>, details: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error_with_details(
            message, details,
        )));
    }

    /// Emit an operation started event
    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    /// Emit an operation completed event
    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }
}

impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}
