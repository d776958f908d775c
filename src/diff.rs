//! Semantic diff between an original text and a claimed quotation.
//!
//! Built on `dissimilar` (diff-match-patch with semantic cleanup), followed
//! by a legibility pass that folds tiny unchanged fragments sitting between
//! two edits into the surrounding edit, then coalesces adjacent edits. The
//! result reads at word/phrase granularity rather than character noise.
//!
//! ## Rendering
//!
//! | Op     | Markup                                        |
//! |--------|-----------------------------------------------|
//! | equal  | `<span>text</span>`                           |
//! | delete | `<del style="background:#ffe6e6;">text</del>` |
//! | insert | `<ins style="background:#e6ffe6;">text</ins>` |
//!
//! Text is HTML-escaped and newlines render as `&para;<br>`.

use serde::{Deserialize, Serialize};

/// Largest unchanged fragment (in chars) folded into neighbouring edits.
const MAX_FOLDED_EQUAL_CHARS: usize = 3;

/// Diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOp {
    /// Present in both texts.
    Equal,
    /// Only in the original.
    Delete,
    /// Only in the quotation.
    Insert,
}

/// One run of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    /// Operation.
    pub op: DiffOp,
    /// Text of the run.
    pub text: String,
}

impl DiffChunk {
    fn new(op: DiffOp, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }
}

/// Semantic diff from `original` to `changed`, with the legibility pass applied.
pub fn semantic_diff(original: &str, changed: &str) -> Vec<DiffChunk> {
    let raw = dissimilar::diff(original, changed)
        .into_iter()
        .map(|chunk| match chunk {
            dissimilar::Chunk::Equal(text) => DiffChunk::new(DiffOp::Equal, text),
            dissimilar::Chunk::Delete(text) => DiffChunk::new(DiffOp::Delete, text),
            dissimilar::Chunk::Insert(text) => DiffChunk::new(DiffOp::Insert, text),
        })
        .collect();
    cleanup(raw)
}

/// Fold insignificant equal runs into the edits around them until stable.
pub fn cleanup(mut chunks: Vec<DiffChunk>) -> Vec<DiffChunk> {
    loop {
        let (folded, changed) = fold_small_equalities(chunks);
        chunks = coalesce(folded);
        if !changed {
            return chunks;
        }
    }
}

fn fold_small_equalities(chunks: Vec<DiffChunk>) -> (Vec<DiffChunk>, bool) {
    let mut out = Vec::with_capacity(chunks.len());
    let mut changed = false;
    let last = chunks.len().saturating_sub(1);

    for (i, chunk) in chunks.iter().enumerate() {
        let between_edits = i > 0
            && i < last
            && chunks[i - 1].op != DiffOp::Equal
            && chunks[i + 1].op != DiffOp::Equal;
        let insignificant = chunk.text.trim().is_empty()
            || chunk.text.chars().count() <= MAX_FOLDED_EQUAL_CHARS;

        if chunk.op == DiffOp::Equal && between_edits && insignificant {
            out.push(DiffChunk::new(DiffOp::Delete, chunk.text.clone()));
            out.push(DiffChunk::new(DiffOp::Insert, chunk.text.clone()));
            changed = true;
        } else {
            out.push(chunk.clone());
        }
    }

    (out, changed)
}

/// Merge each maximal edit region into at most one delete then one insert,
/// and join adjacent equal runs.
fn coalesce(chunks: Vec<DiffChunk>) -> Vec<DiffChunk> {
    let mut out: Vec<DiffChunk> = Vec::with_capacity(chunks.len());
    let mut deleted = String::new();
    let mut inserted = String::new();

    let flush = |out: &mut Vec<DiffChunk>, deleted: &mut String, inserted: &mut String| {
        if !deleted.is_empty() {
            out.push(DiffChunk::new(DiffOp::Delete, std::mem::take(deleted)));
        }
        if !inserted.is_empty() {
            out.push(DiffChunk::new(DiffOp::Insert, std::mem::take(inserted)));
        }
    };

    for chunk in chunks {
        match chunk.op {
            DiffOp::Delete => deleted.push_str(&chunk.text),
            DiffOp::Insert => inserted.push_str(&chunk.text),
            DiffOp::Equal => {
                flush(&mut out, &mut deleted, &mut inserted);
                if chunk.text.is_empty() {
                    continue;
                }
                match out.last_mut() {
                    Some(prev) if prev.op == DiffOp::Equal => prev.text.push_str(&chunk.text),
                    _ => out.push(chunk),
                }
            }
        }
    }
    flush(&mut out, &mut deleted, &mut inserted);

    out
}

/// Render chunks as diff markup.
pub fn render_html(chunks: &[DiffChunk]) -> String {
    let mut html = String::new();
    for chunk in chunks {
        let text = escape(&chunk.text);
        match chunk.op {
            DiffOp::Insert => {
                html.push_str("<ins style=\"background:#e6ffe6;\">");
                html.push_str(&text);
                html.push_str("</ins>");
            }
            DiffOp::Delete => {
                html.push_str("<del style=\"background:#ffe6e6;\">");
                html.push_str(&text);
                html.push_str("</del>");
            }
            DiffOp::Equal => {
                html.push_str("<span>");
                html.push_str(&text);
                html.push_str("</span>");
            }
        }
    }
    html
}

/// Semantic diff of `a` → `b` rendered as markup.
pub fn diff(a: &str, b: &str) -> String {
    render_html(&semantic_diff(a, b))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("&para;<br>"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: &[DiffChunk], keep: DiffOp) -> String {
        chunks
            .iter()
            .filter(|c| c.op == DiffOp::Equal || c.op == keep)
            .map(|c| c.text.as_str())
            .collect()
    }

    #[test]
    fn test_identical_texts_are_one_equal_run() {
        let chunks = semantic_diff("same text", "same text");
        assert_eq!(chunks, vec![DiffChunk::new(DiffOp::Equal, "same text")]);
    }

    #[test]
    fn test_chunks_reconstruct_both_sides() {
        let original = "The installation will be completed by Friday per contract.";
        let quote = "The installation will be completed by next week per conversation.";
        let chunks = semantic_diff(original, quote);
        assert_eq!(reassemble(&chunks, DiffOp::Delete), original);
        assert_eq!(reassemble(&chunks, DiffOp::Insert), quote);
    }

    #[test]
    fn test_cleanup_folds_tiny_equalities() {
        let chunks = cleanup(vec![
            DiffChunk::new(DiffOp::Equal, "by "),
            DiffChunk::new(DiffOp::Delete, "Fri"),
            DiffChunk::new(DiffOp::Insert, "next "),
            DiffChunk::new(DiffOp::Equal, "d"),
            DiffChunk::new(DiffOp::Delete, "ay"),
            DiffChunk::new(DiffOp::Insert, "week"),
            DiffChunk::new(DiffOp::Equal, " per"),
        ]);
        assert_eq!(
            chunks,
            vec![
                DiffChunk::new(DiffOp::Equal, "by "),
                DiffChunk::new(DiffOp::Delete, "Friday"),
                DiffChunk::new(DiffOp::Insert, "next dweek"),
                DiffChunk::new(DiffOp::Equal, " per"),
            ]
        );
    }

    #[test]
    fn test_cleanup_keeps_leading_and_trailing_equalities() {
        let chunks = cleanup(vec![
            DiffChunk::new(DiffOp::Equal, "a"),
            DiffChunk::new(DiffOp::Delete, "b"),
            DiffChunk::new(DiffOp::Equal, "c"),
        ]);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_render_markup() {
        let html = render_html(&[
            DiffChunk::new(DiffOp::Equal, "a < b"),
            DiffChunk::new(DiffOp::Delete, "x\n"),
            DiffChunk::new(DiffOp::Insert, "y & z"),
        ]);
        assert_eq!(
            html,
            "<span>a &lt; b</span>\
             <del style=\"background:#ffe6e6;\">x&para;<br></del>\
             <ins style=\"background:#e6ffe6;\">y &amp; z</ins>"
        );
    }

    #[test]
    fn test_diff_marks_changes() {
        let html = diff("The deadline is Friday.", "The deadline is Monday.");
        assert_eq!(
            html,
            "<span>The deadline is </span>\
             <del style=\"background:#ffe6e6;\">Fri</del>\
             <ins style=\"background:#e6ffe6;\">Mon</ins>\
             <span>day.</span>"
        );
    }
}
