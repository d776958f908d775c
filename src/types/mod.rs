//! Core types for thread forensics.

pub mod atom;
pub mod message;
pub mod style;

pub use atom::{Atom, AttributionMethod, TranscriptRecord, UNRESOLVED_QUOTED_PARTY};
pub use message::{
    mailbox_address, AnalysisSummary, BatchReport, MessagePayload, MessageRecord, ProcessOutcome, ProcessStatus,
};
pub use style::{is_red_family, StyleContext, VisualStyle};
