//! Visual style types.
//!
//! `VisualStyle` is the fixed-schema record attached to every atom. Its
//! canonical serialization is the atom's **visual fingerprint**: keys are
//! emitted in sorted order and unset properties are omitted, so two atoms
//! with the same accumulated style always serialize to the same string.
//!
//! `StyleContext` is the transient `(depth, style)` pair inherited top-down
//! while walking a message tree. It is never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical style record: `{bold, color, uppercase}`.
///
/// Field declaration order is alphabetical; serde emits fields in
/// declaration order, which makes the JSON form key-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualStyle {
    /// Bold weight from `<b>`, `<strong>` or a bold `font-weight`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    /// Lowercased color value, captured verbatim from the markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// `text-transform: uppercase`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub uppercase: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl VisualStyle {
    /// Style with only a color set.
    pub fn colored(color: impl Into<String>) -> Self {
        Self::default().with_color(color)
    }

    /// Style with only bold set.
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    /// Style with only uppercase set.
    pub fn uppercase() -> Self {
        Self {
            uppercase: true,
            ..Self::default()
        }
    }

    /// Override the color. Empty values clear nothing and are ignored.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        let color = color.into().trim().to_lowercase();
        if !color.is_empty() {
            self.color = Some(color);
        }
        self
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        !self.bold && !self.uppercase && self.color.is_none()
    }

    /// Whether the color (if any) belongs to the red family.
    pub fn is_red(&self) -> bool {
        self.color.as_deref().map(is_red_family).unwrap_or(false)
    }

    /// Canonical, key-sorted JSON serialization (the visual fingerprint).
    ///
    /// The empty style serializes as `{}`.
    pub fn to_canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse a serialized style, treating missing or malformed input as empty.
    pub fn from_canonical_json(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<VisualStyle>(raw) {
            Ok(style) => style.normalized(),
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable visual style, treating as empty");
                Self::default()
            }
        }
    }

    fn normalized(self) -> Self {
        let color = self.color.clone();
        let mut out = Self {
            color: None,
            ..self
        };
        if let Some(color) = color {
            out = out.with_color(color);
        }
        out
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_json())
    }
}

/// Named colors treated as red.
const RED_NAMES: &[&str] = &["crimson", "firebrick", "maroon"];

/// Whether a CSS color value belongs to the red family.
///
/// Accepts named colors containing `red` (`red`, `darkred`, `indianred`, …),
/// a few other red names, and `#rgb` / `#rrggbb` / `rgb()` / `rgba()` values
/// whose red channel dominates.
pub fn is_red_family(color: &str) -> bool {
    let color = color.trim().to_lowercase();
    if color.contains("red") || RED_NAMES.contains(&color.as_str()) {
        return true;
    }
    match parse_rgb(&color) {
        Some((r, g, b)) => r >= 128 && u16::from(g) * 2 <= u16::from(r) && u16::from(b) * 2 <= u16::from(r),
        None => false,
    }
}

fn parse_rgb(color: &str) -> Option<(u8, u8, u8)> {
    if let Some(hex) = color.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        return match hex.len() {
            3 | 4 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .ok()
                        .map(|v| v * 17)
                };
                Some((channel(0)?, channel(1)?, channel(2)?))
            }
            6 | 8 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
                Some((channel(0)?, channel(2)?, channel(4)?))
            }
            _ => None,
        };
    }

    let inner = color
        .strip_prefix("rgba(")
        .or_else(|| color.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut parts = inner
        .split(|c: char| c == ',' || c.is_whitespace() || c == '/')
        .filter(|p| !p.is_empty());
    let mut channel = || -> Option<u8> {
        let part = parts.next()?;
        match part.strip_suffix('%') {
            Some(pct) => pct
                .parse::<f32>()
                .ok()
                .map(|v| (v.clamp(0.0, 100.0) * 2.55).round() as u8),
            None => part.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0) as u8),
        }
    };
    Some((channel()?, channel()?, channel()?))
}

/// Inherited traversal context: quote depth plus accumulated style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleContext {
    /// Number of enclosing quote containers.
    pub depth: u32,
    /// Accumulated inline style.
    pub style: VisualStyle,
}

impl StyleContext {
    /// Context one quote level deeper, style unchanged.
    pub fn deeper(&self) -> Self {
        Self {
            depth: self.depth + 1,
            style: self.style.clone(),
        }
    }

    /// Apply the declarations of an inline `style` attribute.
    ///
    /// Only `color`, `font-weight` and `text-transform` are honored.
    /// Declarations that do not parse as `property: value` are skipped.
    pub fn apply_inline_style(&mut self, declarations: &str) {
        for (property, value) in parse_declarations(declarations) {
            match property.as_str() {
                "color" => {
                    self.style = std::mem::take(&mut self.style).with_color(value);
                }
                "font-weight" => {
                    if is_bold_weight(&value) {
                        self.style.bold = true;
                    }
                }
                "text-transform" => {
                    if value == "uppercase" {
                        self.style.uppercase = true;
                    }
                }
                _ => {}
            }
        }
    }
}

/// Split a CSS declaration block into lowercased `(property, value)` pairs.
///
/// `!important` is dropped from values. Fragments without a colon, or with
/// an empty property or value, are skipped.
pub fn parse_declarations(block: &str) -> Vec<(String, String)> {
    block
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_lowercase();
            if property.is_empty() || value.is_empty() {
                None
            } else {
                Some((property, value))
            }
        })
        .collect()
}

fn is_bold_weight(value: &str) -> bool {
    match value {
        "bold" | "bolder" => true,
        numeric => numeric.parse::<u16>().map(|w| w >= 600).unwrap_or(false),
    }
}
