//! Structured response parsing: raw model text → validated flashcards.
//!
//! Models routinely wrap JSON in commentary or markdown fences despite being
//! told not to. Instead of a forgiving JSON repair, we try three cheap ways of
//! locating the array, in priority order, and parse whichever wins:
//!
//! 1. [`fenced_array`] — a ```` ``` ```` fence, optionally tagged `json`,
//!    holding an array literal
//! 2. [`bare_array`]   — the first `[` … last `]` span that opens like an
//!    array of objects; failing that, the first `[` that parses as any JSON
//!    array
//! 3. [`whole_text`]   — the entire output, trimmed
//!
//! The selected candidate is parsed once. If it isn't JSON the result is
//! [`ParseError::MalformedJson`]; later tiers are not tried.
//!
//! Validation then checks every element, in order, against the card shape
//! and stops at the first violation.

use crate::error::{ParseError, ShapeViolation};
use crate::output::Flashcard;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// How `front`/`back` values that aren't JSON strings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CardValuePolicy {
    /// Numbers and booleans become their JSON text (`42`, `true`). (default)
    #[default]
    CoerceScalars,
    /// Only JSON strings are accepted.
    Strict,
}

/// Which extraction tier produced the parsed candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    FencedBlock,
    BareArray,
    WholeText,
}

/// Parse raw model output into an ordered card sequence.
///
/// Source array order is preserved; it becomes the `position` of each card
/// when the set is stored.
pub fn parse_cards(raw: &str, policy: CardValuePolicy) -> Result<Vec<Flashcard>, ParseError> {
    let (source, candidate) = select_candidate(raw);
    debug!(
        "Parsing {} chars of model output via {:?} ({} chars selected)",
        raw.len(),
        source,
        candidate.len()
    );

    let value: Value = serde_json::from_str(candidate).map_err(|e| ParseError::MalformedJson {
        detail: e.to_string(),
    })?;

    validate_cards(&value, policy).map_err(ParseError::InvalidCardShape)
}

/// Run the three tiers in priority order.
pub fn select_candidate(raw: &str) -> (CandidateSource, &str) {
    if let Some(s) = fenced_array(raw) {
        return (CandidateSource::FencedBlock, s);
    }
    if let Some(s) = bare_array(raw) {
        return (CandidateSource::BareArray, s);
    }
    (CandidateSource::WholeText, whole_text(raw))
}

// ── Tier 1: fenced block ─────────────────────────────────────────────────────

static RE_FENCED_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?\s*(\[.*?\])\s*```").unwrap());

/// The array literal inside the first fenced block, if any.
pub fn fenced_array(raw: &str) -> Option<&str> {
    RE_FENCED_ARRAY
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// ── Tier 2: bare array ───────────────────────────────────────────────────────

// Anchored on `[` followed by `{` (or an immediate `]`), so prose such as
// "see [1]" before the real array is skipped. Greedy to the last `}` … `]`.
static RE_BARE_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*(?:\{.*\}\s*)?\]").unwrap());

/// The first bare array literal anywhere in the text, if any.
///
/// An array of objects is preferred. Otherwise the first `[` at which a
/// complete JSON array parses is used, so a wrongly shaped array in prose
/// (`Here you go: ["Q","A"]`) is still validated as an array.
pub fn bare_array(raw: &str) -> Option<&str> {
    RE_BARE_ARRAY
        .find(raw)
        .map(|m| m.as_str())
        .or_else(|| first_parseable_array(raw))
}

fn first_parseable_array(raw: &str) -> Option<&str> {
    raw.match_indices('[').find_map(|(start, _)| {
        let rest = &raw[start..];
        let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Array(_))) => Some(&rest[..values.byte_offset()]),
            _ => None,
        }
    })
}

// ── Tier 3: whole text ───────────────────────────────────────────────────────

/// The entire output, trimmed. Always succeeds.
pub fn whole_text(raw: &str) -> &str {
    raw.trim()
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Check the parsed value against the card shape.
///
/// The top-level value must be an array; every element must be an object
/// with non-empty text under both `front` and `back`. Extra keys are ignored.
pub fn validate_cards(value: &Value, policy: CardValuePolicy) -> Result<Vec<Flashcard>, ShapeViolation> {
    let items = value.as_array().ok_or(ShapeViolation::NotAnArray {
        found: json_kind(value),
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_card(index, item, policy))
        .collect()
}

fn validate_card(index: usize, item: &Value, policy: CardValuePolicy) -> Result<Flashcard, ShapeViolation> {
    let obj = item.as_object().ok_or(ShapeViolation::NotAnObject {
        index,
        found: json_kind(item),
    })?;

    // Both keys must be present before either value is inspected.
    for field in ["front", "back"] {
        if !obj.contains_key(field) {
            return Err(ShapeViolation::MissingField { index, field });
        }
    }

    Ok(Flashcard {
        front: card_text(obj, index, "front", policy)?,
        back: card_text(obj, index, "back", policy)?,
    })
}

fn card_text(
    obj: &Map<String, Value>,
    index: usize,
    field: &'static str,
    policy: CardValuePolicy,
) -> Result<String, ShapeViolation> {
    let value = &obj[field];
    let text = match (value, policy) {
        (Value::String(s), _) => s.clone(),
        (Value::Number(n), CardValuePolicy::CoerceScalars) => n.to_string(),
        (Value::Bool(b), CardValuePolicy::CoerceScalars) => b.to_string(),
        _ => {
            return Err(ShapeViolation::NonTextField {
                index,
                field,
                found: json_kind(value),
            })
        }
    };

    if text.trim().is_empty() {
        return Err(ShapeViolation::EmptyField { index, field });
    }
    Ok(text)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
