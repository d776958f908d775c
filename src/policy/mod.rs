//! Attribution policy definitions.

pub mod predicate;
pub mod v1;

pub use predicate::{is_aggressive, DepthMatch, StylePredicate};
pub use v1::{AttributionPolicyV1, AuthorSource, PolicyRule};
