//! Persistence collaborators (the system of record).

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{AnalysisSummary, MessageRecord, TranscriptRecord};

/// Result of the idempotency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    /// The record was new and has been written.
    Created,
    /// A record with this `message_id` already exists; nothing was written.
    AlreadyExists,
}

/// Trait for message persistence backends.
///
/// `create_message` must be atomic per `message_id`: of several concurrent
/// calls for the same id, exactly one may return `Created`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write the canonical message record unless it already exists.
    async fn create_message(&self, record: &MessageRecord) -> Result<CreateOutcome, Self::Error>;

    /// Persist a message's transcripts.
    async fn batch_create_transcripts(&self, transcripts: &[TranscriptRecord]) -> Result<(), Self::Error>;

    /// Persist the per-message analysis summary.
    async fn store_analysis_summary(
        &self,
        message_id: &str,
        summary: &AnalysisSummary,
    ) -> Result<(), Self::Error>;

    /// Whether the backend is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }
}

pub use memory::{InMemoryMessageStore, InMemoryStoreError};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresMessageStore, PostgresStoreError};
