//! Token estimation utilities.
//!
//! Uses a character-based heuristic: 4 characters per token, rounded down.
//! Close enough for budgeting; nothing here calls a real tokenizer.

use serde_json::{Map, Value};

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / CHARS_PER_TOKEN) as u64
}

/// Estimate tokens for narrative plus its serialized structured payload.
pub fn estimate_exposition_tokens(narrative: &str, structured: &Map<String, Value>) -> u64 {
    let structured_chars = serde_json::to_string(structured)
        .map(|s| s.chars().count())
        .unwrap_or(0);
    ((narrative.chars().count() + structured_chars) / CHARS_PER_TOKEN) as u64
}

/// Clip `text` to at most `max_tokens` worth of characters.
pub fn clip_to_tokens(text: &str, max_tokens: u64) -> &str {
    let max_chars = (max_tokens as usize).saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The first `n` characters of `text`.
pub fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
