//! # thread-forensics
//!
//! Forensic reconstruction of email threads.
//!
//! The crate answers two questions about a message body:
//!
//! > Which statements does it contain, and **who most likely wrote each one**?
//!
//! > Does a claimed quotation **faithfully reproduce** the original text?
//!
//! ## Core Contract
//!
//! 1. Decompose a body (HTML or plain text) into ordered atoms, each stamped
//!    with its quote depth and inherited visual style
//! 2. Attribute every atom through a versioned, hashable depth/style policy
//! 3. Verify quotations by normalized-text hash, with a semantic diff on
//!    mismatch
//!
//! ## Architecture
//!
//! ```text
//! MessagePayload → Atomizer → AttributionEngine → Classifier? → MessageStore
//!                     ↓              ↓
//!                 Segmenter   AttributionPolicyV1
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same message id + same body → identical atom ids, hashes and styles
//! - Same policy parameters → identical `params_hash`
//! - Attribution of an atom depends only on its depth and style

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod segment;
pub mod atomizer;
pub mod policy;
pub mod attribution;
pub mod verification;
pub mod diff;
pub mod classify;
pub mod store;
pub mod observe;
pub mod pipeline;
pub mod error;

mod env;

#[cfg(feature = "remote")]
pub mod remote;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    Atom, AttributionMethod, TranscriptRecord, VisualStyle, StyleContext,
    MessagePayload, MessageRecord, AnalysisSummary, ProcessOutcome, ProcessStatus, BatchReport,
    UNRESOLVED_QUOTED_PARTY,
};
pub use segment::{RuleSegmenter, Segmenter};
pub use atomizer::{Atomizer, AtomizerConfig};
pub use policy::{AttributionPolicyV1, AuthorSource, DepthMatch, PolicyRule, StylePredicate};
pub use attribution::{AttributionEngine, AttributionSummary};
pub use verification::{
    normalize, hash, verify_quote, locate_quote, QuoteVerificationResult,
    CachedVerifier, CachedVerification, CacheConfig, CacheStats,
};
pub use diff::{semantic_diff, render_html, DiffChunk, DiffOp};
pub use classify::{apply_labels, ClassificationItem, Classifier, LabelMap};
pub use store::{CreateOutcome, InMemoryMessageStore, MessageStore};
#[cfg(feature = "postgres")]
pub use store::PostgresMessageStore;
pub use observe::{NoOpObserver, PipelineEvent, PipelineObserver, RecordingObserver, TracingObserver};
pub use pipeline::{Pipeline, PipelineConfig};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};
pub use error::{
    AtomizeError, ClassificationError, PipelineError, PolicyError, SegmentationError,
};

#[cfg(feature = "remote")]
pub use remote::{WorkerClient, WorkerConfig, WorkerError};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState, PolicyRef};

/// Schema version for all serialized forensics types.
/// Increment on breaking changes to any schema type.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "attribution_policy_v1";
