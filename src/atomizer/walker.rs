//! Style/depth tree walker for HTML bodies.
//!
//! Depth-first traversal with an explicit stack of `(node, context)` pairs.
//! Children are pushed in reverse so they pop in document order, which is
//! what makes `sequence_index` follow document order exactly.
//!
//! ## Context Rules
//!
//! - Entering a quote container adds 1 to depth for every descendant
//! - `<b>` / `<strong>` and bold `font-weight` set bold
//! - `color` declarations and `<font color>` override the inherited color
//! - `text-transform: uppercase` sets uppercase
//! - Bold and uppercase are never cleared by descendants
//!
//! Unknown tags are plain containers. Comments, doctypes and skipped
//! elements contribute nothing.

use scraper::{ElementRef, Html, Node};

use crate::error::AtomizeError;
use crate::segment::Segmenter;
use crate::types::{Atom, StyleContext};
use super::AtomizerConfig;

/// Walk an HTML document and emit one atom per sentence of every text node.
pub fn walk_html(
    message_id: &str,
    html: &str,
    segmenter: &dyn Segmenter,
    config: &AtomizerConfig,
) -> Result<Vec<Atom>, AtomizeError> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let body = root
        .children()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "body")
        .unwrap_or(root);

    let mut atoms = Vec::new();
    let mut stack = vec![(*body, StyleContext::default())];

    while let Some((node, ctx)) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                let text: &str = text;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                for sentence in segmenter.segment(text)? {
                    atoms.push(Atom::new(
                        message_id,
                        atoms.len(),
                        sentence,
                        ctx.depth,
                        ctx.style.clone(),
                    ));
                }
            }
            Node::Element(element) => {
                if config.is_skipped(element.name()) {
                    continue;
                }
                let ctx = enter_element(element, ctx, config);
                let children: Vec<_> = node.children().collect();
                for child in children.into_iter().rev() {
                    stack.push((child, ctx.clone()));
                }
            }
            _ => {}
        }
    }

    Ok(atoms)
}

/// Derive the context for an element's descendants.
fn enter_element(
    element: &scraper::node::Element,
    parent: StyleContext,
    config: &AtomizerConfig,
) -> StyleContext {
    let name = element.name();
    let mut ctx = if config.is_quote_container(name) {
        parent.deeper()
    } else {
        parent
    };

    if matches!(name, "b" | "strong") {
        ctx.style.bold = true;
    }
    if matches!(name, "font" | "basefont") {
        if let Some(color) = element.attr("color") {
            ctx.style = std::mem::take(&mut ctx.style).with_color(color);
        }
    }
    if let Some(declarations) = element.attr("style") {
        ctx.apply_inline_style(declarations);
    }

    ctx
}
