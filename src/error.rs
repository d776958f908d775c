//! Error types for the forensic pipeline layers.
//!
//! Lower layers (atomizer, attribution, verification) only fail on truly
//! unrecoverable input. Malformed markup, bad style fragments and ambiguous
//! attribution all degrade to defaults instead of surfacing here.

use std::time::Duration;
use thiserror::Error;

/// The sentence segmenter could not run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SegmentationError {
    /// Segmentation resource (model, rules) missing or unusable.
    #[error("Sentence segmenter unavailable: {reason}")]
    Unavailable {
        /// What was missing.
        reason: String,
    },
}

/// Atomization failed for a message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AtomizeError {
    /// Segmentation failure is fatal for the message.
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
}

/// External classification failed. Never fatal for the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    /// The call did not finish in time.
    #[error("Classification timed out after {after:?}")]
    Timeout {
        /// Time bound that was exceeded.
        after: Duration,
    },

    /// The collaborator could not be reached or refused the call.
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered with something unusable.
    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),
}

/// An attribution policy table is not usable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The table has no rules.
    #[error("Policy {policy_id} has no rules")]
    EmptyTable {
        /// Offending policy.
        policy_id: String,
    },

    /// Some quote depth matches no rule.
    #[error("Policy {policy_id} leaves depth {depth} without a matching rule")]
    UncoveredDepth {
        /// Offending policy.
        policy_id: String,
        /// First depth with no fallback.
        depth: u32,
    },

    /// A rule can never fire because an earlier rule always matches first.
    #[error("Policy {policy_id}: rule {index} is unreachable")]
    UnreachableRule {
        /// Offending policy.
        policy_id: String,
        /// Index of the shadowed rule.
        index: usize,
    },
}

/// Failure inside one message-processing pass.
///
/// The orchestrator converts these into an error outcome; they are not
/// returned from `process_message`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The message has no id.
    #[error("Message payload has no messageId")]
    MissingMessageId,

    /// Writing the canonical message record failed (not a duplicate).
    #[error("Message record write failed: {0}")]
    MessageWrite(String),

    /// Atomization failed.
    #[error("Atomization failed: {0}")]
    Atomize(#[from] AtomizeError),

    /// Transcript write failed.
    #[error("Transcript write failed: {0}")]
    TranscriptWrite(String),

    /// Analysis summary write failed.
    #[error("Analysis write failed: {0}")]
    AnalysisWrite(String),
}
