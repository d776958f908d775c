//! Pipeline observation.
//!
//! The orchestrator reports every state transition to an injected
//! [`PipelineObserver`] instead of writing to a global logger. Atomizer,
//! attribution and verification never see an observer.

use parking_lot::Mutex;
use serde::Serialize;

use crate::attribution::AttributionSummary;
use crate::types::ProcessStatus;

/// A per-message state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Processing started.
    Received,
    /// Message already recorded; short-circuited.
    Duplicate,
    /// Atomizer finished.
    Atomized {
        /// Atoms produced.
        count: usize,
    },
    /// Attribution finished.
    Attributed {
        /// Counts from the pass.
        summary: AttributionSummary,
    },
    /// Classification labels applied.
    Classified {
        /// Atoms that received at least one label.
        labeled: usize,
    },
    /// Classification failed or timed out; atoms stay unlabeled.
    ClassificationFailed {
        /// Failure description.
        reason: String,
    },
    /// Transcripts written.
    TranscriptsPersisted {
        /// Rows written.
        count: usize,
    },
    /// Analysis summary written.
    AnalysisStored,
    /// Terminal status reached.
    Completed {
        /// Final status.
        status: ProcessStatus,
    },
}

impl PipelineEvent {
    /// Short event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Duplicate => "duplicate",
            Self::Atomized { .. } => "atomized",
            Self::Attributed { .. } => "attributed",
            Self::Classified { .. } => "classified",
            Self::ClassificationFailed { .. } => "classification_failed",
            Self::TranscriptsPersisted { .. } => "transcripts_persisted",
            Self::AnalysisStored => "analysis_stored",
            Self::Completed { .. } => "completed",
        }
    }
}

/// Receiver of pipeline events.
pub trait PipelineObserver: Send + Sync {
    /// Called for each transition of `message_id`.
    fn on_event(&self, message_id: &str, event: &PipelineEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl PipelineObserver for NoOpObserver {
    fn on_event(&self, _message_id: &str, _event: &PipelineEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, message_id: &str, event: &PipelineEvent) {
        match event {
            PipelineEvent::ClassificationFailed { reason } => {
                tracing::warn!(
                    target: "thread_forensics::pipeline",
                    message_id = %message_id,
                    reason = %reason,
                    "Classification failed, continuing unlabeled"
                );
            }
            PipelineEvent::Completed { status: ProcessStatus::Error } => {
                tracing::error!(
                    target: "thread_forensics::pipeline",
                    message_id = %message_id,
                    "Message processing failed"
                );
            }
            PipelineEvent::Atomized { count } | PipelineEvent::TranscriptsPersisted { count } => {
                tracing::info!(
                    target: "thread_forensics::pipeline",
                    message_id = %message_id,
                    event = event.name(),
                    count = *count,
                    "pipeline_event"
                );
            }
            _ => {
                tracing::info!(
                    target: "thread_forensics::pipeline",
                    message_id = %message_id,
                    event = event.name(),
                    "pipeline_event"
                );
            }
        }
    }
}

/// Records events in memory (for testing).
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(String, PipelineEvent)>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events.
    pub fn events(&self) -> Vec<(String, PipelineEvent)> {
        self.events.lock().clone()
    }

    /// Event names recorded for one message, in order.
    pub fn names_for(&self, message_id: &str) -> Vec<&'static str> {
        self.events
            .lock()
            .iter()
            .filter(|(id, _)| id == message_id)
            .map(|(_, e)| e.name())
            .collect()
    }

    /// Clear recorded events.
    pub fn reset(&self) {
        self.events.lock().clear();
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, message_id: &str, event: &PipelineEvent) {
        self.events.lock().push((message_id.to_string(), event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer() {
        let observer = RecordingObserver::new();
        observer.on_event("m1", &PipelineEvent::Received);
        observer.on_event("m2", &PipelineEvent::Received);
        observer.on_event("m1", &PipelineEvent::Duplicate);

        assert_eq!(observer.names_for("m1"), vec!["received", "duplicate"]);
        assert_eq!(observer.events().len(), 3);
        observer.reset();
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(PipelineEvent::Atomized { count: 4 }).unwrap();
        assert_eq!(json["event"], "atomized");
        assert_eq!(json["count"], 4);
    }
}
