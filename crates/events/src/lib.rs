#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for the plugpm resolver
//!
//! Resolution progress and diagnostics are published as structured events
//! over an unbounded channel. Consumers may drop the receiver at any time;
//! emission never fails.

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod resolver;
pub use resolver::{DependencyConflictType, ResolverEvent};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// An event together with its metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: ResolverEvent,
}

impl EventMessage {
    /// Wrap an event with fresh metadata derived from its level
    #[must_use]
    pub fn new(event: ResolverEvent) -> Self {
        Self {
            meta: EventMeta::new(event.level(), EventSource::RESOLVER),
            event,
        }
    }

    /// Wrap an event attributed to `source`
    #[must_use]
    pub fn from_source(event: ResolverEvent, source: EventSource) -> Self {
        Self {
            meta: EventMeta::new(event.level(), source),
            event,
        }
    }
}

/// Type alias for the event sender
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events
///
/// Implemented by anything that may hold an `EventSender`, so call sites do
/// not have to care whether events are being collected.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: ResolverEvent) {
        self.emit_with_meta(EventMessage::new(event));
    }

    /// Emit a pre-built message, keeping its metadata
    fn emit_with_meta(&self, message: EventMessage) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(message);
        }
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
