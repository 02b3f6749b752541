//! An injected event sink port, replacing the shared global events
//! singleton pattern: the Seeker and Augmenter hold an `Arc<dyn EventSink>`
//! handed to them at construction rather than reaching for process-wide
//! state, and emit a bounded, explicit set of event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    QueryReceived,
    ProvidersQueried,
    ProviderFailed,
    ResultsProcessed,
    ResponseReady,
    QueryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub source: String,
    pub task_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            severity: Severity::Info,
            source: source.into(),
            task_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Port through which the core emits lifecycle events. Implementations
/// must not block the caller meaningfully; emission is best-effort.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Default sink that discards every event; used when no collaborator is
/// wired up.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: Event) {}
}

/// Sink that forwards events onto an unbounded channel, used by tests to
/// assert emission order and by callers that want to observe the event
/// stream without the core depending on their transport.
pub struct ChannelEventSink {
    sender: tokio::sync::mpsc::UnboundedSender<Event>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

pub fn null_sink() -> Arc<dyn EventSink> {
    Arc::new(NullEventSink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_forwards_events_in_order() {
        let (sink, mut receiver) = ChannelEventSink::new();
        sink.emit(Event::new(EventType::QueryReceived, "seeker"));
        sink.emit(Event::new(EventType::ResponseReady, "seeker"));

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.event_type, EventType::QueryReceived);
        assert_eq!(second.event_type, EventType::ResponseReady);
    }

    #[test]
    fn null_sink_drops_silently() {
        let sink = null_sink();
        sink.emit(Event::new(EventType::QueryFailed, "seeker"));
    }
}
