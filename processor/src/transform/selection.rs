//! Picking one charge out of a pipe-separated list.
//!
//! The model only ever gets to choose among the original candidates: an
//! answer that is neither one of them nor contains one verbatim is replaced
//! by the first candidate, and so is a failed API call.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::ai::{prompt, ChatModel, ChatRequest};
use crate::logging::preview;
use crate::models::{placeholder, Charges, FallbackReason, Selection};

/// Leading list enumeration such as `2. ` or `2) `. The trailing space is
/// required so quantities like `4.5 grams` are left alone.
static ENUMERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)]\s+").expect("enumeration regex is valid"));

/// How one job asks the model and what it writes when there is nothing to ask.
#[derive(Clone, Copy)]
pub struct ChargeSelector {
    pub prompt: fn(&Charges) -> ChatRequest,
    /// Cell is blank.
    pub empty_text: &'static str,
    /// Cell only holds separators.
    pub no_valid_text: &'static str,
}

impl ChargeSelector {
    /// Most dramatic charge, for display.
    pub const EXCITING: ChargeSelector = ChargeSelector {
        prompt: prompt::exciting_charge,
        empty_text: placeholder::NO_EXPLANATIONS,
        no_valid_text: placeholder::NO_VALID_EXPLANATIONS,
    };

    /// Most interesting, unusual or serious raw charge.
    pub const INTERESTING: ChargeSelector = ChargeSelector {
        prompt: prompt::interesting_charge,
        empty_text: placeholder::NO_RAW_CHARGES,
        no_valid_text: placeholder::NO_VALID_CHARGES,
    };

    /// Select one charge from `raw`, calling `model` only when there is a choice.
    pub async fn select<M: ChatModel>(&self, model: &M, raw: &str) -> Selection {
        if raw.trim().is_empty() {
            return Selection::Empty(self.empty_text);
        }

        let charges = Charges::parse(raw);
        let first = match charges.first() {
            None => return Selection::Empty(self.no_valid_text),
            Some(first) if charges.len() == 1 => return Selection::Single(first.to_string()),
            Some(first) => first.to_string(),
        };

        info!("Asking model to choose among {} charges: {}", charges.len(), preview(raw, 100));
        let request = (self.prompt)(&charges);

        let selection = match model.complete(&request).await {
            Ok(answer) => resolve_answer(&charges, &answer),
            Err(e) => Selection::Fallback {
                charge: first,
                reason: FallbackReason::ApiFailure(e.to_string()),
            },
        };

        match &selection {
            Selection::Matched(c) => {
                info!("Found original charge '{}' within model answer. Using original.", c)
            }
            Selection::Fallback { charge, reason } => {
                warn!("Selection fallback ({}). Using first charge: {}", reason, charge)
            }
            _ => {}
        }

        selection
    }
}

/// Map a model answer back onto the candidate list.
///
/// Exact match first, then the first candidate contained in the answer,
/// then the first candidate.
pub fn resolve_answer(charges: &Charges, answer: &str) -> Selection {
    let trimmed = answer.trim();
    if charges.contains(trimmed) {
        return Selection::Picked(trimmed.to_string());
    }

    let normalized = normalize_answer(answer);
    if charges.contains(&normalized) {
        return Selection::Picked(normalized);
    }
    if let Some(found) = charges.find_within(answer) {
        return Selection::Matched(found.to_string());
    }

    Selection::Fallback {
        charge: charges.first().unwrap_or_default().to_string(),
        reason: FallbackReason::UnknownAnswer(answer.to_string()),
    }
}

/// Trim, unwrap quotes and drop a leading list number.
pub fn normalize_answer(answer: &str) -> String {
    let mut text = answer.trim();

    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if text.len() > 1 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
            break;
        }
    }

    ENUMERATION.replace(text, "").trim().to_string()
}
