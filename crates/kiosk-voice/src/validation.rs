//! Free-form answer checks: abort vocabulary, type validation and digit extraction.
//!
//! Kept free of any async or device code so the rules can be tested directly.

use crate::field::FieldType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Words that cancel a voice collection when they appear anywhere in a transcript.
pub const ABORT_KEYWORDS: &[&str] = &["stop", "quit", "exit", "cancel", "abort"];

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("static digit pattern"));

/// Case-insensitive substring match against [`ABORT_KEYWORDS`].
pub fn is_abort_command(transcript: &str) -> bool {
    let lower = transcript.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    ABORT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether `transcript` is an acceptable answer for a field of `field_type`.
pub fn validate_response(transcript: &str, field_type: &FieldType) -> bool {
    if transcript.trim().is_empty() {
        return false;
    }
    match field_type {
        FieldType::Integer => DIGIT_RUN.is_match(transcript),
        FieldType::String | FieldType::Other(_) => true,
    }
}

/// First contiguous run of ASCII digits, if any.
pub fn extract_digits(transcript: &str) -> Option<&str> {
    DIGIT_RUN.find(transcript).map(|m| m.as_str())
}

/// Stored form of a collected answer: integers keep their first digit run.
pub fn normalize_value(transcript: &str, field_type: &FieldType) -> String {
    match field_type {
        FieldType::Integer => extract_digits(transcript).unwrap_or(transcript).to_string(),
        _ => transcript.to_string(),
    }
}

pub fn default_prompt(field_name: &str) -> String {
    format!("Please provide {}", field_name)
}
