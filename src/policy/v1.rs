//! AttributionPolicy v1: ordered `(depth, style) -> (author, method)` table.
//!
//! Rules are evaluated top to bottom and the first match wins. The default
//! table encodes the interjection heuristic:
//!
//! | # | depth  | style      | author        | method                         |
//! |---|--------|------------|---------------|--------------------------------|
//! | 0 | `== 0` | any        | sender        | `HEADER_DEPTH_0`               |
//! | 1 | `>= 1` | aggressive | sender        | `STYLE_INFERENCE_INTERJECTION` |
//! | 2 | `>= 1` | any        | quoted party  | `QUOTE_DEPTH`                  |
//!
//! The table is plain data: alternative policies are built by constructing
//! a different rule list, without touching traversal or segmentation.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::error::PolicyError;
use crate::types::{AttributionMethod, VisualStyle, UNRESOLVED_QUOTED_PARTY};
use crate::DEFAULT_POLICY_VERSION;
use super::predicate::{DepthMatch, StylePredicate};

/// Who a matching rule attributes the atom to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorSource {
    /// The message sender.
    Sender,
    /// The quoted party (resolved participant or the sentinel).
    QuotedParty,
}

/// One row of the policy table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Depth condition.
    pub depth: DepthMatch,
    /// Style condition.
    pub style: StylePredicate,
    /// Author to assign.
    pub author: AuthorSource,
    /// Method to record.
    pub method: AttributionMethod,
}

impl PolicyRule {
    /// Create a rule.
    pub fn new(
        depth: DepthMatch,
        style: StylePredicate,
        author: AuthorSource,
        method: AttributionMethod,
    ) -> Self {
        Self {
            depth,
            style,
            author,
            method,
        }
    }

    /// Whether the rule applies to `(depth, style)`.
    pub fn matches(&self, depth: u32, style: &VisualStyle) -> bool {
        self.depth.matches(depth) && self.style.matches(style)
    }
}

/// Attribution policy version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Ordered rules; first match wins.
    pub rules: Vec<PolicyRule>,
    /// Author recorded for unresolved quoted text.
    pub quoted_party_sentinel: String,
}

impl AttributionPolicyV1 {
    /// Build and validate a custom table.
    pub fn new(version: impl Into<String>, rules: Vec<PolicyRule>) -> Result<Self, PolicyError> {
        let policy = Self {
            version: version.into(),
            rules,
            quoted_party_sentinel: UNRESOLVED_QUOTED_PARTY.to_string(),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Deterministic hash of the full table.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }

    /// First rule matching `(depth, style)`.
    pub fn evaluate(&self, depth: u32, style: &VisualStyle) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.matches(depth, style))
    }

    /// Check that the table is non-empty, every depth has a fallback, and no
    /// rule is fully shadowed by an earlier catch-all.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.rules.is_empty() {
            return Err(PolicyError::EmptyTable {
                policy_id: self.version.clone(),
            });
        }

        for (index, rule) in self.rules.iter().enumerate() {
            let shadowed = self.rules[..index].iter().any(|earlier| {
                earlier.style == StylePredicate::Any && earlier.depth.covers(&rule.depth)
            });
            if shadowed {
                return Err(PolicyError::UnreachableRule {
                    policy_id: self.version.clone(),
                    index,
                });
            }
        }

        // Coverage only changes at a depth literal or one past it.
        let mut candidates: Vec<u32> = self
            .rules
            .iter()
            .flat_map(|r| {
                let d = r.depth.threshold();
                [d, d.saturating_add(1)]
            })
            .chain(std::iter::once(0))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        for depth in candidates {
            let covered = self
                .rules
                .iter()
                .any(|r| r.style == StylePredicate::Any && r.depth.matches(depth));
            if !covered {
                return Err(PolicyError::UncoveredDepth {
                    policy_id: self.version.clone(),
                    depth,
                });
            }
        }

        Ok(())
    }
}

impl Default for AttributionPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            rules: vec![
                PolicyRule::new(
                    DepthMatch::Exactly(0),
                    StylePredicate::Any,
                    AuthorSource::Sender,
                    AttributionMethod::HeaderDepth0,
                ),
                PolicyRule::new(
                    DepthMatch::AtLeast(1),
                    StylePredicate::Aggressive,
                    AuthorSource::Sender,
                    AttributionMethod::StyleInferenceInterjection,
                ),
                PolicyRule::new(
                    DepthMatch::AtLeast(1),
                    StylePredicate::Any,
                    AuthorSource::QuotedParty,
                    AttributionMethod::QuoteDepth,
                ),
            ],
            quoted_party_sentinel: UNRESOLVED_QUOTED_PARTY.to_string(),
        }
    }
}
