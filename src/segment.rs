//! Sentence segmentation.
//!
//! The atomizer consumes sentence boundaries through the [`Segmenter`]
//! trait so a model-backed detector can be swapped in. [`RuleSegmenter`] is
//! the deterministic default: it splits after `.`, `!` or `?` when the next
//! word does not start in lowercase, except after known abbreviations and
//! single-letter initials. Blank lines always end a sentence.

use std::collections::BTreeSet;

use crate::error::SegmentationError;

/// Sentence-boundary capability.
///
/// Implementations must be deterministic for a fixed configuration.
pub trait Segmenter: Send + Sync {
    /// Split a text block into ordered, trimmed, non-empty sentences.
    fn segment(&self, text: &str) -> Result<Vec<String>, SegmentationError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

const TERMINATORS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 6] = ['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];

/// Abbreviations that do not end a sentence (lowercase, without the dot).
const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "vs", "etc", "inc", "ltd", "corp", "dept",
    "approx", "fig", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct",
    "nov", "dec", "e.g", "i.e", "a.m", "p.m",
];

/// Deterministic rule-based segmenter.
#[derive(Debug, Clone)]
pub struct RuleSegmenter {
    abbreviations: BTreeSet<String>,
}

impl Default for RuleSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSegmenter {
    /// Segmenter with the default abbreviation list.
    pub fn new() -> Self {
        Self {
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add abbreviations (case-insensitive, trailing dot optional).
    pub fn with_abbreviations<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for abbr in extra {
            let abbr = abbr.as_ref().trim().trim_end_matches('.').to_lowercase();
            if !abbr.is_empty() {
                self.abbreviations.insert(abbr);
            }
        }
        self
    }

    fn split_paragraph(&self, paragraph: &str, out: &mut Vec<String>) {
        let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            if !TERMINATORS.contains(&chars[i].1) {
                i += 1;
                continue;
            }

            let terminator = i;
            let mut j = i + 1;
            while j < chars.len()
                && (TERMINATORS.contains(&chars[j].1) || CLOSERS.contains(&chars[j].1))
            {
                j += 1;
            }

            let end = chars.get(j).map(|(b, _)| *b).unwrap_or(paragraph.len());
            let boundary = match chars.get(j) {
                None => true,
                Some((_, c)) if c.is_whitespace() => {
                    self.is_boundary(paragraph, &chars, terminator, j)
                }
                Some(_) => false,
            };

            if boundary {
                push_sentence(&paragraph[start..end], out);
                start = end;
            }
            i = j;
        }

        push_sentence(&paragraph[start..], out);
    }

    fn is_boundary(&self, text: &str, chars: &[(usize, char)], terminator: usize, after: usize) -> bool {
        let next = chars[after..].iter().map(|(_, c)| *c).find(|c| !c.is_whitespace());
        match next {
            None => return true,
            Some(c) if c.is_lowercase() => return false,
            Some(_) => {}
        }

        if chars[terminator].1 != '.' {
            return true;
        }

        let mut token_start = terminator;
        while token_start > 0 {
            let c = chars[token_start - 1].1;
            if c.is_alphanumeric() || c == '.' {
                token_start -= 1;
            } else {
                break;
            }
        }
        let token = &text[chars[token_start].0..chars[terminator].0];
        if token.is_empty() {
            return true;
        }

        let lower = token.to_lowercase();
        if self.abbreviations.contains(lower.trim_end_matches('.')) {
            return false;
        }
        // Dotted forms like "u.s" or "p.m"
        if lower.contains('.') && lower.chars().any(char::is_alphabetic) {
            return false;
        }
        // Initials
        let mut token_chars = token.chars();
        if let (Some(c), None) = (token_chars.next(), token_chars.next()) {
            if c.is_uppercase() && c != 'I' {
                return false;
            }
        }
        true
    }
}

impl Segmenter for RuleSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>, SegmentationError> {
        let mut sentences = Vec::new();
        for paragraph in split_paragraphs(text) {
            self.split_paragraph(&paragraph, &mut sentences);
        }
        Ok(sentences)
    }

    fn name(&self) -> &str {
        "rule"
    }
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Whitespace runs inside a sentence collapse to one space.
fn push_sentence(piece: &str, out: &mut Vec<String>) {
    let sentence = piece.split_whitespace().collect::<Vec<_>>().join(" ");
    if !sentence.is_empty() {
        out.push(sentence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Vec<String> {
        RuleSegmenter::new().segment(text).unwrap()
    }

    #[test]
    fn test_basic_split() {
        assert_eq!(
            seg("Did you get the permit? Yes we did. Please confirm!"),
            vec!["Did you get the permit?", "Yes we did.", "Please confirm!"]
        );
    }

    #[test]
    fn test_no_terminator_is_one_sentence() {
        assert_eq!(seg("  YES WE DID  "), vec!["YES WE DID"]);
        assert_eq!(seg("On Jan 1, Victim wrote:"), vec!["On Jan 1, Victim wrote:"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(seg("").is_empty());
        assert!(seg(" \n\t ").is_empty());
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        assert_eq!(
            seg("Mr. Smith met Dr. Jones on Jan. 5. They agreed."),
            vec!["Mr. Smith met Dr. Jones on Jan. 5.", "They agreed."]
        );
        assert_eq!(seg("Bring tools, e.g. a ladder."), vec!["Bring tools, e.g. a ladder."]);
    }

    #[test]
    fn test_initials_do_not_split() {
        assert_eq!(seg("John F. Kennedy spoke."), vec!["John F. Kennedy spoke."]);
        assert_eq!(seg("So did I. Then we left."), vec!["So did I.", "Then we left."]);
    }

    #[test]
    fn test_lowercase_continuation_does_not_split() {
        assert_eq!(seg("It cost 3.50 today. ok fine."), vec!["It cost 3.50 today. ok fine."]);
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        assert_eq!(
            seg("He said \"stop.\" Then he left."),
            vec!["He said \"stop.\"", "Then he left."]
        );
    }

    #[test]
    fn test_blank_line_breaks_sentence() {
        assert_eq!(
            seg("Regards\n\nJohn Smith\nCEO"),
            vec!["Regards", "John Smith CEO"]
        );
    }

    #[test]
    fn test_custom_abbreviation() {
        let segmenter = RuleSegmenter::new().with_abbreviations(["Approx.", "Ave"]);
        let out = segmenter.segment("Go to 5th Ave. North side.").unwrap();
        assert_eq!(out, vec!["Go to 5th Ave. North side."]);
    }

    #[test]
    fn test_deterministic() {
        let text = "One. Two! Three? Four.";
        assert_eq!(seg(text), seg(text));
    }
}
