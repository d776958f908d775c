//! External classification capability.
//!
//! Classification is best-effort enrichment: the orchestrator bounds every
//! call with a timeout and carries on with unlabeled atoms on any failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ClassificationError;
use crate::types::Atom;

/// Labels per atom id.
pub type LabelMap = BTreeMap<String, Vec<String>>;

/// One item sent for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationItem {
    /// Atom id.
    pub id: String,
    /// Atom text.
    pub content: String,
}

impl From<&Atom> for ClassificationItem {
    fn from(atom: &Atom) -> Self {
        Self {
            id: atom.id().to_string(),
            content: atom.content().to_string(),
        }
    }
}

/// Classification collaborator.
///
/// Ids missing from the returned map simply receive no labels.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a batch of atoms.
    async fn classify(&self, items: &[ClassificationItem]) -> Result<LabelMap, ClassificationError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Apply labels to atoms; returns how many atoms received at least one label.
///
/// Every atom is marked as classified, including ones absent from `labels`.
pub fn apply_labels(atoms: &mut [Atom], labels: &LabelMap) -> usize {
    let mut labeled = 0;
    for atom in atoms.iter_mut() {
        let found = labels.get(atom.id()).cloned().unwrap_or_default();
        if !found.is_empty() {
            labeled += 1;
        }
        atom.append_labels(found);
    }
    labeled
}
