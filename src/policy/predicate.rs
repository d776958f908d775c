//! Rule predicates: depth matchers and style predicates.

use serde::{Deserialize, Serialize};

use crate::types::VisualStyle;

/// Quote-depth condition of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "depth", rename_all = "snake_case")]
pub enum DepthMatch {
    /// Matches every depth.
    Any,
    /// Matches one depth.
    Exactly(u32),
    /// Matches this depth and deeper.
    AtLeast(u32),
}

impl DepthMatch {
    /// Whether `depth` satisfies the condition.
    pub fn matches(&self, depth: u32) -> bool {
        match *self {
            Self::Any => true,
            Self::Exactly(d) => depth == d,
            Self::AtLeast(d) => depth >= d,
        }
    }

    /// Whether every depth matched by `other` is also matched by `self`.
    pub fn covers(&self, other: &DepthMatch) -> bool {
        match (*self, *other) {
            (Self::Any, _) => true,
            (_, Self::Any) => false,
            (Self::Exactly(a), Self::Exactly(b)) => a == b,
            (Self::Exactly(_), Self::AtLeast(_)) => false,
            (Self::AtLeast(a), Self::Exactly(b)) => b >= a,
            (Self::AtLeast(a), Self::AtLeast(b)) => b >= a,
        }
    }

    /// Largest depth literal mentioned (0 for `Any`).
    pub(crate) fn threshold(&self) -> u32 {
        match *self {
            Self::Any => 0,
            Self::Exactly(d) | Self::AtLeast(d) => d,
        }
    }
}

/// Style condition of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylePredicate {
    /// Matches every style, including the empty one.
    Any,
    /// Red-family color, bold, or uppercase.
    Aggressive,
    /// Not aggressive.
    Plain,
    /// Red-family color.
    RedColor,
    /// Bold weight.
    Bold,
    /// Uppercase transform.
    Uppercase,
}

impl StylePredicate {
    /// Evaluate against a style.
    pub fn matches(&self, style: &VisualStyle) -> bool {
        match self {
            Self::Any => true,
            Self::Aggressive => is_aggressive(style),
            Self::Plain => !is_aggressive(style),
            Self::RedColor => style.is_red(),
            Self::Bold => style.bold,
            Self::Uppercase => style.uppercase,
        }
    }
}

/// Conspicuous styling: red-family color, bold weight or uppercase.
pub fn is_aggressive(style: &VisualStyle) -> bool {
    style.is_red() || style.bold || style.uppercase
}
