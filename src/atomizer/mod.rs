//! Atomizer: message body → ordered, styled, depth-stamped atoms.
//!
//! ## Paths
//!
//! - **HTML** (any non-blank `html`): parsed into a tolerant DOM and walked
//!   depth-first from `<body>`; see [`walker`].
//! - **Plain text** (blank `html`, non-blank `plain`): lines are grouped into
//!   runs of equal leading-`>` depth, markers stripped, and each run
//!   segmented. Depth-0 sentences are attributed to the sender right away.
//!
//! Depths from the two paths count different things (container nesting vs
//! marker count) and are not comparable across formats.
//!
//! ## Ordering Guarantees
//!
//! - `sequence_index` is exactly `0..N-1` in document order
//! - Identical input yields byte-identical atoms (ids, hashes, styles)

pub mod walker;

use std::sync::{Arc, OnceLock};

use regex_lite::Regex;

use crate::error::AtomizeError;
use crate::segment::{RuleSegmenter, Segmenter};
use crate::types::{Atom, AttributionMethod, VisualStyle};

/// Element names that are never atomized by default.
pub const DEFAULT_SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "title", "noscript", "template"];

/// Atomizer configuration.
#[derive(Debug, Clone)]
pub struct AtomizerConfig {
    /// Elements that increase quote depth for their descendants.
    pub quote_containers: Vec<String>,
    /// Elements whose subtree is ignored.
    pub skipped_elements: Vec<String>,
}

impl Default for AtomizerConfig {
    fn default() -> Self {
        Self {
            quote_containers: vec!["blockquote".to_string()],
            skipped_elements: DEFAULT_SKIPPED_ELEMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AtomizerConfig {
    /// Load from environment.
    ///
    /// `FORENSICS_QUOTE_CONTAINERS` is a comma-separated element list
    /// (default `blockquote`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("FORENSICS_QUOTE_CONTAINERS") {
            let names = parse_element_list(&raw);
            if !names.is_empty() {
                config.quote_containers = names;
            }
        }
        config
    }

    /// Whether `name` is a quote container.
    pub fn is_quote_container(&self, name: &str) -> bool {
        self.quote_containers.iter().any(|q| q.eq_ignore_ascii_case(name))
    }

    /// Whether `name`'s subtree is skipped.
    pub fn is_skipped(&self, name: &str) -> bool {
        self.skipped_elements.iter().any(|s| s.eq_ignore_ascii_case(name))
    }
}

fn parse_element_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits message bodies into atoms.
///
/// Holds no per-message state; one instance can serve concurrent calls.
#[derive(Clone)]
pub struct Atomizer {
    segmenter: Arc<dyn Segmenter>,
    config: AtomizerConfig,
}

impl std::fmt::Debug for Atomizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atomizer")
            .field("segmenter", &self.segmenter.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Atomizer {
    fn default() -> Self {
        Self::new(Arc::new(RuleSegmenter::new()))
    }
}

impl Atomizer {
    /// Atomizer with default configuration.
    pub fn new(segmenter: Arc<dyn Segmenter>) -> Self {
        Self::with_config(segmenter, AtomizerConfig::default())
    }

    /// Atomizer with explicit configuration.
    pub fn with_config(segmenter: Arc<dyn Segmenter>, config: AtomizerConfig) -> Self {
        Self { segmenter, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AtomizerConfig {
        &self.config
    }

    /// Atomize one message.
    ///
    /// Fails only if the segmenter fails. Malformed markup never errors.
    pub fn atomize(
        &self,
        message_id: &str,
        html: &str,
        plain: &str,
        sender: Option<&str>,
    ) -> Result<Vec<Atom>, AtomizeError> {
        let atoms = if !html.trim().is_empty() {
            walker::walk_html(message_id, html, self.segmenter.as_ref(), &self.config)?
        } else if !plain.trim().is_empty() {
            self.atomize_plain(message_id, plain, sender)?
        } else {
            Vec::new()
        };

        tracing::debug!(
            message_id = %message_id,
            atoms = atoms.len(),
            segmenter = self.segmenter.name(),
            "Atomized message"
        );
        Ok(atoms)
    }

    fn atomize_plain(
        &self,
        message_id: &str,
        plain: &str,
        sender: Option<&str>,
    ) -> Result<Vec<Atom>, AtomizeError> {
        let mut atoms = Vec::new();

        for (depth, block) in quote_runs(plain) {
            for sentence in self.segmenter.segment(&block)? {
                let mut atom = Atom::new(message_id, atoms.len(), sentence, depth, VisualStyle::default());
                if depth == 0 {
                    if let Some(sender) = sender {
                        atom.attribute(sender, AttributionMethod::HeaderDepth0);
                    }
                }
                atoms.push(atom);
            }
        }

        Ok(atoms)
    }
}

fn quote_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"^((?:[ \t]*>)+)[ \t]?").expect("quote marker pattern is valid")
    })
}

/// Group lines into runs of equal quote depth, markers stripped.
fn quote_runs(text: &str) -> Vec<(u32, String)> {
    let marker = quote_marker();
    let mut runs: Vec<(u32, Vec<&str>)> = Vec::new();

    for line in text.lines() {
        let (depth, stripped) = match marker.captures(line) {
            Some(caps) => {
                let markers = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let consumed = caps.get(0).map(|m| m.end()).unwrap_or(0);
                (markers.matches('>').count() as u32, &line[consumed..])
            }
            None => (0, line),
        };

        match runs.last_mut() {
            Some((run_depth, lines)) if *run_depth == depth => lines.push(stripped),
            _ => runs.push((depth, vec![stripped])),
        }
    }

    runs.into_iter()
        .map(|(depth, lines)| (depth, lines.join("\n")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentationError;

    struct BrokenSegmenter;

    impl Segmenter for BrokenSegmenter {
        fn segment(&self, _text: &str) -> Result<Vec<String>, SegmentationError> {
            Err(SegmentationError::Unavailable {
                reason: "model not loaded".to_string(),
            })
        }
    }

    #[test]
    fn test_quote_runs_group_by_depth() {
        let runs = quote_runs("Hello there.\n> First line\n> continues.\n>> Deeper.\nBack.");
        let depths: Vec<u32> = runs.iter().map(|(d, _)| *d).collect();
        assert_eq!(depths, vec![0, 1, 2, 0]);
        assert_eq!(runs[1].1, "First line\ncontinues.");
        assert_eq!(runs[2].1, "Deeper.");
    }

    #[test]
    fn test_quote_runs_spaced_markers() {
        let runs = quote_runs(" > > Nested with spaces.");
        assert_eq!(runs, vec![(2, "Nested with spaces.".to_string())]);
    }

    #[test]
    fn test_plain_path_attributes_depth_zero() {
        let atomizer = Atomizer::default();
        let atoms = atomizer
            .atomize("m1", "", "Sounds good. See below.\n> Did you pay?\n> Yes.", Some("me@x.com"))
            .unwrap();

        assert_eq!(atoms.len(), 4);
        assert_eq!(atoms[0].attributed_to(), Some("me@x.com"));
        assert_eq!(atoms[0].attribution_method(), Some(AttributionMethod::HeaderDepth0));
        assert_eq!(atoms[2].content(), "Did you pay?");
        assert_eq!(atoms[2].quote_depth(), 1);
        assert!(!atoms[2].is_attributed());
        assert!(atoms.iter().all(|a| a.visual_style().is_empty()));
    }

    #[test]
    fn test_plain_path_without_sender() {
        let atoms = Atomizer::default().atomize("m1", "", "Hi.", None).unwrap();
        assert_eq!(atoms.len(), 1);
        assert!(!atoms[0].is_attributed());
    }

    #[test]
    fn test_blank_html_uses_plain() {
        let atoms = Atomizer::default().atomize("m1", "  \n ", "Plain only.", None).unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].content(), "Plain only.");
    }

    #[test]
    fn test_empty_message_has_no_atoms() {
        assert!(Atomizer::default().atomize("m1", "", "", None).unwrap().is_empty());
    }

    #[test]
    fn test_segmentation_failure_is_fatal() {
        let atomizer = Atomizer::new(Arc::new(BrokenSegmenter));
        let err = atomizer.atomize("m1", "<p>Hi.</p>", "", None).unwrap_err();
        assert!(matches!(err, AtomizeError::Segmentation(_)));
        let err = atomizer.atomize("m1", "", "Hi.", None).unwrap_err();
        assert!(matches!(err, AtomizeError::Segmentation(_)));
    }

    #[test]
    fn test_config_element_list() {
        assert_eq!(
            parse_element_list(" blockquote, DIV ,,"),
            vec!["blockquote".to_string(), "div".to_string()]
        );
        let config = AtomizerConfig::default();
        assert!(config.is_quote_container("BLOCKQUOTE"));
        assert!(config.is_skipped("script"));
        assert!(!config.is_skipped("span"));
    }
}
