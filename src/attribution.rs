//! Attribution engine: assigns an author and method to each atom.
//!
//! Attribution is per-atom and stateless across atoms: the outcome depends
//! only on the atom's `(quote_depth, visual_style)`, the sender and the
//! optional participant list. Atoms that are already attributed (the
//! plain-text path attributes depth-0 sentences itself) are left alone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::policy::{AttributionPolicyV1, AuthorSource};
use crate::types::{mailbox_address, Atom, AttributionMethod};

/// Counts from one attribution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionSummary {
    /// Atoms attributed in this pass.
    pub attributed: usize,
    /// Atoms skipped because they were already attributed.
    pub preattributed: usize,
    /// Atoms no rule matched (left unattributed).
    pub unmatched: usize,
    /// Atoms per method, including pre-attributed ones.
    pub by_method: BTreeMap<AttributionMethod, usize>,
}

/// Applies an attribution policy to atoms.
#[derive(Debug, Clone, Default)]
pub struct AttributionEngine {
    policy: AttributionPolicyV1,
}

impl AttributionEngine {
    /// Engine for a specific policy.
    pub fn new(policy: AttributionPolicyV1) -> Self {
        Self { policy }
    }

    /// Get the policy.
    pub fn policy(&self) -> &AttributionPolicyV1 {
        &self.policy
    }

    /// Attribute atoms in place.
    ///
    /// `participants`, when given, resolves quoted text to the only other
    /// participant if there is exactly one; otherwise quoted text goes to
    /// the unresolved sentinel.
    pub fn attribute_atoms(
        &self,
        atoms: &mut [Atom],
        sender: &str,
        participants: Option<&[String]>,
    ) -> AttributionSummary {
        let quoted_party = self.resolve_quoted_party(sender, participants);
        let mut summary = AttributionSummary::default();

        for atom in atoms.iter_mut() {
            if let Some(method) = atom.attribution_method() {
                summary.preattributed += 1;
                *summary.by_method.entry(method).or_insert(0) += 1;
                continue;
            }

            let Some(rule) = self.policy.evaluate(atom.quote_depth(), atom.visual_style()) else {
                tracing::warn!(
                    atom_id = %atom.id(),
                    depth = atom.quote_depth(),
                    policy = %self.policy.policy_id(),
                    "No attribution rule matched"
                );
                summary.unmatched += 1;
                continue;
            };

            let author = match rule.author {
                AuthorSource::Sender => sender,
                AuthorSource::QuotedParty => quoted_party.as_str(),
            };
            atom.attribute(author, rule.method);
            summary.attributed += 1;
            *summary.by_method.entry(rule.method).or_insert(0) += 1;
        }

        tracing::debug!(
            attributed = summary.attributed,
            preattributed = summary.preattributed,
            unmatched = summary.unmatched,
            "Attribution pass complete"
        );
        summary
    }

    fn resolve_quoted_party(&self, sender: &str, participants: Option<&[String]>) -> String {
        let sentinel = || self.policy.quoted_party_sentinel.clone();
        let Some(participants) = participants else {
            return sentinel();
        };

        let sender = mailbox_address(sender);
        let mut others: Vec<&str> = participants
            .iter()
            .map(|p| mailbox_address(p))
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(sender))
            .collect();
        others.sort_by_key(|p| p.to_lowercase());
        others.dedup_by(|a, b| a.eq_ignore_ascii_case(b));

        match others.as_slice() {
            [only] => only.to_string(),
            _ => sentinel(),
        }
    }
}
