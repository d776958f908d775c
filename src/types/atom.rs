//! Atom types.
//!
//! An [`Atom`] is the smallest attributable unit of text extracted from a
//! message, typically one sentence. Content and structural fields are fixed
//! at construction; attribution is set exactly once; labels may only be
//! appended.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{atom_id, content_hash};
use super::style::VisualStyle;

/// Sentinel author for quoted text whose speaker is not yet resolved.
pub const UNRESOLVED_QUOTED_PARTY: &str = "Quoted_Party";

/// How an atom's author was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributionMethod {
    /// Unquoted text, attributed to the message sender.
    #[serde(rename = "HEADER_DEPTH_0")]
    HeaderDepth0,
    /// Conspicuously styled text inside a quote, attributed to the sender.
    #[serde(rename = "STYLE_INFERENCE_INTERJECTION")]
    StyleInferenceInterjection,
    /// Plain quoted text, attributed to the quoted party.
    #[serde(rename = "QUOTE_DEPTH")]
    QuoteDepth,
}

impl AttributionMethod {
    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderDepth0 => "HEADER_DEPTH_0",
            Self::StyleInferenceInterjection => "STYLE_INFERENCE_INTERJECTION",
            Self::QuoteDepth => "QUOTE_DEPTH",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HEADER_DEPTH_0" => Some(Self::HeaderDepth0),
            "STYLE_INFERENCE_INTERJECTION" => Some(Self::StyleInferenceInterjection),
            "QUOTE_DEPTH" => Some(Self::QuoteDepth),
            _ => None,
        }
    }
}

impl fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Smallest attributable unit of text in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    id: String,
    message_id: String,
    content: String,
    normalized_hash: String,
    sequence_index: usize,
    quote_depth: u32,
    visual_style: VisualStyle,
    attributed_to: Option<String>,
    attribution_method: Option<AttributionMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
}

impl Atom {
    /// Create an unattributed atom.
    ///
    /// `content` is stored trimmed; `id` and `normalized_hash` are derived.
    pub fn new(
        message_id: impl Into<String>,
        sequence_index: usize,
        content: impl AsRef<str>,
        quote_depth: u32,
        visual_style: VisualStyle,
    ) -> Self {
        let message_id = message_id.into();
        let content = content.as_ref().trim().to_string();
        Self {
            id: atom_id(&message_id, sequence_index),
            normalized_hash: content_hash(&content),
            message_id,
            content,
            sequence_index,
            quote_depth,
            visual_style,
            attributed_to: None,
            attribution_method: None,
            labels: None,
        }
    }

    /// Deterministic id: `sha256(message_id "_" sequence_index)`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning message.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Trimmed sentence text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// `sha256(lowercase(trim(content)))`.
    pub fn normalized_hash(&self) -> &str {
        &self.normalized_hash
    }

    /// Position in document order, contiguous from 0.
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    /// Number of enclosing quote containers.
    pub fn quote_depth(&self) -> u32 {
        self.quote_depth
    }

    /// Accumulated inline style.
    pub fn visual_style(&self) -> &VisualStyle {
        &self.visual_style
    }

    /// Attributed author, if attribution has run.
    pub fn attributed_to(&self) -> Option<&str> {
        self.attributed_to.as_deref()
    }

    /// Attribution method, if attribution has run.
    pub fn attribution_method(&self) -> Option<AttributionMethod> {
        self.attribution_method
    }

    /// Whether attribution has been set.
    pub fn is_attributed(&self) -> bool {
        self.attribution_method.is_some()
    }

    /// Labels from external classification, if any.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Set author and method.
    ///
    /// Attribution is write-once: returns `false` and leaves the atom
    /// unchanged if it is already attributed.
    pub fn attribute(&mut self, author: impl Into<String>, method: AttributionMethod) -> bool {
        if self.is_attributed() {
            return false;
        }
        self.attributed_to = Some(author.into());
        self.attribution_method = Some(method);
        true
    }

    /// Append labels, skipping ones already present.
    ///
    /// An empty iterator still marks the atom as classified (`Some(vec![])`).
    pub fn append_labels<I, L>(&mut self, labels: I)
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let existing = self.labels.get_or_insert_with(Vec::new);
        for label in labels {
            let label = label.into();
            if !existing.contains(&label) {
                existing.push(label);
            }
        }
    }
}

/// Persisted atom shape, with the external field names of the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRecord {
    /// Atom id.
    pub id: String,
    /// Owning message.
    pub message_id: String,
    /// Sentence text.
    pub content: String,
    /// Content hash.
    pub normalized_hash: String,
    /// Document-order index.
    pub sequence_index: usize,
    /// Quote nesting depth.
    pub quote_depth: u32,
    /// Canonical serialized style (`"{}"` when empty).
    pub visual_style: String,
    /// Attributed author.
    pub attributed_to: Option<String>,
    /// Attribution method wire name.
    pub attribution_method: Option<AttributionMethod>,
    /// Labels, empty when unclassified.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&Atom> for TranscriptRecord {
    fn from(atom: &Atom) -> Self {
        Self {
            id: atom.id.clone(),
            message_id: atom.message_id.clone(),
            content: atom.content.clone(),
            normalized_hash: atom.normalized_hash.clone(),
            sequence_index: atom.sequence_index,
            quote_depth: atom.quote_depth,
            visual_style: atom.visual_style.to_canonical_json(),
            attributed_to: atom.attributed_to.clone(),
            attribution_method: atom.attribution_method,
            tags: atom.labels.clone().unwrap_or_default(),
        }
    }
}
