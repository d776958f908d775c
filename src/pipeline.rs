//! Pipeline orchestrator.
//!
//! ## State Machine (per message)
//!
//! ```text
//! RECEIVED → PERSIST_ATTEMPTED ─┬─ DUPLICATE (skipped)
//!                               └─ ATOMIZED → ATTRIBUTED → CLASSIFIED? →
//!                                  TRANSCRIPTS_PERSISTED → ANALYSIS_STORED → DONE
//! ```
//!
//! ## Guarantees
//!
//! - The idempotency gate runs first: a duplicate `message_id` never reaches
//!   the atomizer, attribution or the classifier
//! - Classification is time-bounded; failure or timeout leaves atoms
//!   unlabeled and processing continues
//! - A persistence failure ends the message in `error`; no retry happens here
//! - `process_message` never returns `Err`; every failure becomes an outcome
//!
//! A single message runs strictly sequentially. Distinct messages share no
//! mutable state, so `process_batch` runs them as concurrent tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::atomizer::Atomizer;
use crate::attribution::AttributionEngine;
use crate::classify::{apply_labels, ClassificationItem, Classifier};
use crate::env::{env_flag, env_or, env_string};
use crate::error::{ClassificationError, PipelineError};
use crate::observe::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::policy::AttributionPolicyV1;
use crate::store::{CreateOutcome, MessageStore};
use crate::types::{
    AnalysisSummary, Atom, BatchReport, MessagePayload, ProcessOutcome, TranscriptRecord,
};

/// Author recorded when a message has no sender.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Orchestrator configuration.
///
/// ## Environment
///
/// - `FORENSICS_CLASSIFY_ENABLED` (default: true)
/// - `FORENSICS_CLASSIFY_TIMEOUT_SECS` (default: 20)
/// - `FORENSICS_BATCH_CONCURRENCY` (default: 4)
/// - `FORENSICS_ENGAGEMENT_ID` (default: `default`)
/// - `FORENSICS_RESOLVE_QUOTED_PARTY` (default: false)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whether to call the classifier.
    pub classify_enabled: bool,
    /// Upper bound on one classification call.
    pub classify_timeout: Duration,
    /// Messages in flight during `process_batch`.
    pub batch_concurrency: usize,
    /// Engagement stamped on message records.
    pub engagement_id: String,
    /// Resolve quoted text to the only other header participant.
    pub resolve_quoted_party: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classify_enabled: true,
            classify_timeout: Duration::from_secs(20),
            batch_concurrency: 4,
            engagement_id: "default".to_string(),
            resolve_quoted_party: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            classify_enabled: env_flag("FORENSICS_CLASSIFY_ENABLED", defaults.classify_enabled),
            classify_timeout: Duration::from_secs(env_or(
                "FORENSICS_CLASSIFY_TIMEOUT_SECS",
                defaults.classify_timeout.as_secs(),
            )),
            batch_concurrency: env_or("FORENSICS_BATCH_CONCURRENCY", defaults.batch_concurrency).max(1),
            engagement_id: env_string("FORENSICS_ENGAGEMENT_ID").unwrap_or(defaults.engagement_id),
            resolve_quoted_party: env_flag(
                "FORENSICS_RESOLVE_QUOTED_PARTY",
                defaults.resolve_quoted_party,
            ),
        }
    }
}

/// Per-message forensic pipeline over a persistence collaborator.
pub struct Pipeline<S: MessageStore> {
    store: Arc<S>,
    classifier: Option<Arc<dyn Classifier>>,
    observer: Arc<dyn PipelineObserver>,
    atomizer: Atomizer,
    engine: AttributionEngine,
    config: PipelineConfig,
}

impl<S: MessageStore + 'static> Pipeline<S> {
    /// Pipeline with default atomizer, policy and config, no classifier,
    /// reporting to tracing.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            classifier: None,
            observer: Arc::new(TracingObserver),
            atomizer: Atomizer::default(),
            engine: AttributionEngine::default(),
            config: PipelineConfig::default(),
        }
    }

    /// Set the classification collaborator.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the observer.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the atomizer.
    pub fn with_atomizer(mut self, atomizer: Atomizer) -> Self {
        self.atomizer = atomizer;
        self
    }

    /// Set the attribution policy.
    pub fn with_policy(mut self, policy: AttributionPolicyV1) -> Self {
        self.engine = AttributionEngine::new(policy);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the atomizer.
    pub fn atomizer(&self) -> &Atomizer {
        &self.atomizer
    }

    /// Get the attribution engine.
    pub fn engine(&self) -> &AttributionEngine {
        &self.engine
    }

    /// Whether a classifier is configured.
    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Get the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Atomize and attribute without touching the store or the classifier.
    pub fn analyze(
        &self,
        payload: &MessagePayload,
        participants: Option<&[String]>,
    ) -> Result<Vec<Atom>, PipelineError> {
        let sender = payload.sender().unwrap_or(UNKNOWN_SENDER);
        let mut atoms =
            self.atomizer
                .atomize(&payload.message_id, payload.html(), payload.plain(), Some(sender))?;
        self.engine.attribute_atoms(&mut atoms, sender, participants);
        Ok(atoms)
    }

    /// Process one message end to end.
    pub async fn process_message(&self, payload: &MessagePayload) -> ProcessOutcome {
        let message_id = payload.message_id.trim().to_string();
        self.emit(&message_id, PipelineEvent::Received);

        let outcome = match self.run(&message_id, payload).await {
            Ok(outcome) => outcome,
            Err(e) => ProcessOutcome::error(&message_id, 0, e.to_string()),
        };

        self.emit(
            &message_id,
            PipelineEvent::Completed {
                status: outcome.status,
            },
        );
        outcome
    }

    async fn run(&self, message_id: &str, payload: &MessagePayload) -> Result<ProcessOutcome, PipelineError> {
        if message_id.is_empty() {
            return Err(PipelineError::MissingMessageId);
        }

        // Idempotency gate
        let mut record = payload.to_record(&self.config.engagement_id);
        record.message_id = message_id.to_string();
        let created = self
            .store
            .create_message(&record)
            .await
            .map_err(|e| PipelineError::MessageWrite(e.to_string()))?;
        if created == CreateOutcome::AlreadyExists {
            self.emit(message_id, PipelineEvent::Duplicate);
            return Ok(ProcessOutcome::skipped(message_id));
        }

        // Atomize
        let sender = payload.sender().unwrap_or(UNKNOWN_SENDER);
        let mut atoms = self
            .atomizer
            .atomize(message_id, payload.html(), payload.plain(), Some(sender))?;
        self.emit(message_id, PipelineEvent::Atomized { count: atoms.len() });

        // Attribute
        let participants = if self.config.resolve_quoted_party {
            Some(payload.participants())
        } else {
            None
        };
        let summary = self
            .engine
            .attribute_atoms(&mut atoms, sender, participants.as_deref());
        self.emit(message_id, PipelineEvent::Attributed { summary });

        // Classify (best effort)
        self.classify(message_id, &mut atoms).await;

        // Persist
        if !atoms.is_empty() {
            let transcripts: Vec<TranscriptRecord> = atoms.iter().map(TranscriptRecord::from).collect();
            self.store
                .batch_create_transcripts(&transcripts)
                .await
                .map_err(|e| PipelineError::TranscriptWrite(e.to_string()))?;
        }
        self.emit(message_id, PipelineEvent::TranscriptsPersisted { count: atoms.len() });

        let policy = self.engine.policy();
        let analysis = AnalysisSummary::from_atoms(message_id, &atoms, policy.policy_id(), policy.params_hash());
        self.store
            .store_analysis_summary(message_id, &analysis)
            .await
            .map_err(|e| PipelineError::AnalysisWrite(e.to_string()))?;
        self.emit(message_id, PipelineEvent::AnalysisStored);

        Ok(ProcessOutcome::success(message_id, atoms.len()))
    }

    async fn classify(&self, message_id: &str, atoms: &mut [Atom]) {
        if !self.config.classify_enabled || atoms.is_empty() {
            return;
        }
        let Some(classifier) = &self.classifier else {
            return;
        };

        let items: Vec<ClassificationItem> = atoms.iter().map(ClassificationItem::from).collect();
        let timeout = self.config.classify_timeout;
        let result = match tokio::time::timeout(timeout, classifier.classify(&items)).await {
            Ok(result) => result,
            Err(_) => Err(ClassificationError::Timeout { after: timeout }),
        };

        match result {
            Ok(labels) => {
                let labeled = apply_labels(atoms, &labels);
                self.emit(message_id, PipelineEvent::Classified { labeled });
            }
            Err(e) => {
                self.emit(
                    message_id,
                    PipelineEvent::ClassificationFailed {
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    /// Process many messages, at most `batch_concurrency` at a time.
    ///
    /// Outcomes are reported in input order.
    pub async fn process_batch(self: &Arc<Self>, payloads: Vec<MessagePayload>) -> BatchReport {
        let ids: Vec<String> = payloads.iter().map(|p| p.message_id.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.batch_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, payload) in payloads.into_iter().enumerate() {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, pipeline.process_message(&payload).await)
            });
        }

        let mut outcomes: Vec<Option<ProcessOutcome>> = vec![None; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "Batch task aborted"),
            }
        }

        let outcomes = outcomes
            .into_iter()
            .zip(ids)
            .map(|(outcome, id)| {
                outcome.unwrap_or_else(|| ProcessOutcome::error(id, 0, "task aborted"))
            })
            .collect();
        BatchReport::from_outcomes(outcomes)
    }

    fn emit(&self, message_id: &str, event: PipelineEvent) {
        self.observer.on_event(message_id, &event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RecordingObserver;
    use crate::store::InMemoryMessageStore;
    use crate::types::{AttributionMethod, ProcessStatus};

    fn pipeline() -> (Pipeline<InMemoryMessageStore>, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::new());
        let pipeline = Pipeline::new(Arc::new(InMemoryMessageStore::new()))
            .with_observer(observer.clone());
        (pipeline, observer)
    }

    #[tokio::test]
    async fn test_success_path_events() {
        let (pipeline, observer) = pipeline();
        let payload = MessagePayload::new("m1")
            .with_header("From", "me@x.com")
            .with_html("<p>Hello.</p><blockquote>Old text.</blockquote>");

        let outcome = pipeline.process_message(&payload).await;
        assert_eq!(outcome.status, ProcessStatus::Success);
        assert_eq!(outcome.atoms, 2);
        assert_eq!(
            observer.names_for("m1"),
            vec![
                "received",
                "atomized",
                "attributed",
                "transcripts_persisted",
                "analysis_stored",
                "completed"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_id_is_error() {
        let (pipeline, _) = pipeline();
        let outcome = pipeline.process_message(&MessagePayload::new("  ")).await;
        assert_eq!(outcome.status, ProcessStatus::Error);
        assert_eq!(pipeline.store().message_count(), 0);
    }

    #[tokio::test]
    async fn test_participant_resolution() {
        let observer = Arc::new(RecordingObserver::new());
        let config = PipelineConfig {
            resolve_quoted_party: true,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(Arc::new(InMemoryMessageStore::new()))
            .with_observer(observer)
            .with_config(config);
        let payload = MessagePayload::new("m1")
            .with_header("From", "me@x.com")
            .with_header("To", "Victim <victim@y.com>")
            .with_html("<blockquote>Did you get the permit?</blockquote>");

        pipeline.process_message(&payload).await;
        let rows = pipeline.store().transcripts("m1");
        assert_eq!(rows[0].attributed_to.as_deref(), Some("victim@y.com"));
        assert_eq!(rows[0].attribution_method, Some(AttributionMethod::QuoteDepth));
    }

    #[test]
    fn test_analyze_has_no_side_effects() {
        let (pipeline, observer) = pipeline();
        let payload = MessagePayload::new("m1").with_plain("Hi.");
        let atoms = pipeline.analyze(&payload, None).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].attributed_to(), Some(UNKNOWN_SENDER));
        assert_eq!(pipeline.store().message_count(), 0);
        assert!(observer.events().is_empty());
    }
}
