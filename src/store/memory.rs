//! In-memory message store for testing and local runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::{AnalysisSummary, MessageRecord, TranscriptRecord};
use super::{CreateOutcome, MessageStore};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryStoreError {
    /// A failure injected by a test.
    #[error("Injected failure in {operation}")]
    Injected {
        /// Operation that was told to fail.
        operation: &'static str,
    },
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, Default)]
struct FaultPlan {
    create_message: bool,
    transcripts: bool,
    analysis: bool,
}

#[derive(Debug, Default)]
struct Tables {
    messages: BTreeMap<String, MessageRecord>,
    transcripts: BTreeMap<String, Vec<TranscriptRecord>>,
    analyses: BTreeMap<String, AnalysisSummary>,
}

/// In-memory message store.
///
/// Uses BTreeMap for deterministic iteration order. The write lock makes
/// `create_message` atomic per `message_id`.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    tables: RwLock<Tables>,
    faults: RwLock<FaultPlan>,
    transcript_writes: AtomicUsize,
}

impl InMemoryMessageStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_message` fail (other than duplicates).
    pub fn fail_create_message(&self, fail: bool) {
        self.faults.write().create_message = fail;
    }

    /// Make `batch_create_transcripts` fail.
    pub fn fail_transcripts(&self, fail: bool) {
        self.faults.write().transcripts = fail;
    }

    /// Make `store_analysis_summary` fail.
    pub fn fail_analysis(&self, fail: bool) {
        self.faults.write().analysis = fail;
    }

    /// Number of stored message records.
    pub fn message_count(&self) -> usize {
        self.tables.read().messages.len()
    }

    /// Stored message record.
    pub fn message(&self, message_id: &str) -> Option<MessageRecord> {
        self.tables.read().messages.get(message_id).cloned()
    }

    /// Stored transcripts for a message, in sequence order.
    pub fn transcripts(&self, message_id: &str) -> Vec<TranscriptRecord> {
        self.tables
            .read()
            .transcripts
            .get(message_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total transcripts across all messages.
    pub fn transcript_count(&self) -> usize {
        self.tables.read().transcripts.values().map(Vec::len).sum()
    }

    /// Number of successful `batch_create_transcripts` calls.
    pub fn transcript_write_count(&self) -> usize {
        self.transcript_writes.load(Ordering::SeqCst)
    }

    /// Stored analysis summary.
    pub fn analysis(&self, message_id: &str) -> Option<AnalysisSummary> {
        self.tables.read().analyses.get(message_id).cloned()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    type Error = InMemoryStoreError;

    async fn create_message(&self, record: &MessageRecord) -> Result<CreateOutcome, Self::Error> {
        if self.faults.read().create_message {
            return Err(InMemoryStoreError::Injected {
                operation: "create_message",
            });
        }

        let mut tables = self.tables.write();
        if tables.messages.contains_key(&record.message_id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        tables.messages.insert(record.message_id.clone(), record.clone());
        Ok(CreateOutcome::Created)
    }

    async fn batch_create_transcripts(&self, transcripts: &[TranscriptRecord]) -> Result<(), Self::Error> {
        if self.faults.read().transcripts {
            return Err(InMemoryStoreError::Injected {
                operation: "batch_create_transcripts",
            });
        }

        let mut tables = self.tables.write();
        for record in transcripts {
            let rows = tables.transcripts.entry(record.message_id.clone()).or_default();
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => rows.push(record.clone()),
            }
            rows.sort_by_key(|r| r.sequence_index);
        }
        self.transcript_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn store_analysis_summary(
        &self,
        message_id: &str,
        summary: &AnalysisSummary,
    ) -> Result<(), Self::Error> {
        if self.faults.read().analysis {
            return Err(InMemoryStoreError::Injected {
                operation: "store_analysis_summary",
            });
        }

        self.tables
            .write()
            .analyses
            .insert(message_id.to_string(), summary.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessagePayload;

    fn record(id: &str) -> MessageRecord {
        MessagePayload::new(id).with_plain("Hi.").to_record("default")
    }

    fn transcript(message_id: &str, index: usize) -> TranscriptRecord {
        TranscriptRecord {
            id: format!("{}-{}", message_id, index),
            message_id: message_id.to_string(),
            content: "Hi.".to_string(),
            normalized_hash: String::new(),
            sequence_index: index,
            quote_depth: 0,
            visual_style: "{}".to_string(),
            attributed_to: None,
            attribution_method: None,
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = InMemoryMessageStore::new();
        assert_eq!(store.create_message(&record("m1")).await.unwrap(), CreateOutcome::Created);
        assert_eq!(
            store.create_message(&record("m1")).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(store.message_count(), 1);
    }

    #[tokio::test]
    async fn test_transcripts_upsert_in_order() {
        let store = InMemoryMessageStore::new();
        store
            .batch_create_transcripts(&[transcript("m1", 1), transcript("m1", 0)])
            .await
            .unwrap();
        store.batch_create_transcripts(&[transcript("m1", 1)]).await.unwrap();

        let rows = store.transcripts("m1");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sequence_index, 0);
        assert_eq!(store.transcript_write_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryMessageStore::new();
        store.fail_transcripts(true);
        assert!(store.batch_create_transcripts(&[transcript("m1", 0)]).await.is_err());
        assert_eq!(store.transcript_count(), 0);

        store.fail_analysis(true);
        let summary = AnalysisSummary::default();
        assert!(store.store_analysis_summary("m1", &summary).await.is_err());

        store.fail_create_message(true);
        assert!(store.create_message(&record("m2")).await.is_err());
        assert!(store.is_healthy().await);
    }
}
