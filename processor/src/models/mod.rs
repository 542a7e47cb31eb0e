//! Domain models for charge processing.
//!
//! - [`Charges`] - the candidate list parsed out of one pipe-separated cell
//! - [`Selection`] - which candidate was chosen and how
//! - [`placeholder`] - fixed texts written when there is nothing to choose from

use std::fmt;

// =============================================================================
// Charges
// =============================================================================

/// Separator between charges inside one CSV cell.
pub const CHARGE_SEPARATOR: char = '|';

/// Non-empty, trimmed charge descriptions in their original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charges(Vec<String>);

impl Charges {
    /// Split a raw cell on `|`, trimming items and dropping empty ones.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(CHARGE_SEPARATOR)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.0.iter().any(|c| c == candidate)
    }

    /// First candidate that appears verbatim inside `text`.
    pub fn find_within(&self, text: &str) -> Option<&str> {
        self.iter().find(|c| text.contains(c))
    }

    /// `1. first\n2. second\n...` as sent to the model.
    pub fn numbered_list(&self) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Why the first candidate was used instead of the model's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The API call failed.
    ApiFailure(String),
    /// The answer matched none of the candidates.
    UnknownAnswer(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::ApiFailure(e) => write!(f, "API call failed: {}", e),
            FallbackReason::UnknownAnswer(a) => write!(f, "answer '{}' not in candidate list", a),
        }
    }
}

/// Outcome of picking one charge from a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Nothing to choose from; carries the placeholder text.
    Empty(&'static str),
    /// Only one candidate, no model call made.
    Single(String),
    /// Model answer equals a candidate.
    Picked(String),
    /// Model answer contains a candidate.
    Matched(String),
    /// First candidate used.
    Fallback { charge: String, reason: FallbackReason },
}

impl Selection {
    /// Text written to the output column.
    pub fn text(&self) -> &str {
        match self {
            Selection::Empty(p) => p,
            Selection::Single(c)
            | Selection::Picked(c)
            | Selection::Matched(c)
            | Selection::Fallback { charge: c, .. } => c,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Selection::Empty(p) => p.to_string(),
            Selection::Single(c)
            | Selection::Picked(c)
            | Selection::Matched(c)
            | Selection::Fallback { charge: c, .. } => c,
        }
    }

    /// True when a real charge (not a placeholder) was selected.
    pub fn is_charge(&self) -> bool {
        !matches!(self, Selection::Empty(_))
    }
}

// =============================================================================
// Placeholder texts
// =============================================================================

/// Fixed values written to the output column.
pub mod placeholder {
    /// Display job: the explanation cell is blank.
    pub const NO_AI_EXPLANATION: &str = "No AI explanation available";
    /// Display job: blank input reached the selector.
    pub const NO_EXPLANATIONS: &str = "No explanations provided";
    /// Display job: only separators in the cell.
    pub const NO_VALID_EXPLANATIONS: &str = "No valid explanations found after parsing";

    /// Plain job: the description cell is blank.
    pub const NO_RAW_CHARGES_LISTED: &str = "No raw charges listed";
    /// Plain job: blank input reached the selector.
    pub const NO_RAW_CHARGES: &str = "No raw charges provided";
    /// Plain job: only separators in the cell.
    pub const NO_VALID_CHARGES: &str = "No valid charges found after parsing";
    /// Plain job: reword asked for a placeholder.
    pub const CANNOT_REWORD: &str = "Cannot reword invalid/empty charge";
    /// Plain job: reword call failed after all retries.
    pub const REWORD_FAILED: &str = "Error: API call failed after 3 attempts.";
}
