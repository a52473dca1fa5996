//! Token budget enforcer.
//!
//! Tail truncation only: sections are never reordered or prioritized, so an
//! over-budget exposition loses its trailing layers first.

use crate::token::take_chars;
use strata_core::Exposition;
use strata_core::exposition::TRUNCATION_MARKER;
use tracing::info;

/// Clamp `exposition` to `max_tokens`.
///
/// A no-op when already within budget; otherwise the narrative is cut to
/// `floor(chars * max / used * safety_factor)` characters, the truncation
/// marker is appended, and the reported usage becomes `max_tokens`.
/// Returns whether anything was cut.
pub fn enforce_budget(exposition: &mut Exposition, max_tokens: u64, safety_factor: f64) -> bool {
    let used = exposition.token_count;
    if used <= max_tokens {
        return false;
    }

    let chars = exposition.narrative.chars().count();
    let ratio = max_tokens as f64 / used as f64;
    let keep = (chars as f64 * ratio * safety_factor).floor() as usize;

    let mut narrative = take_chars(&exposition.narrative, keep).to_string();
    narrative.push_str(TRUNCATION_MARKER);
    // The marker must not make a tiny narrative longer than it was.
    if narrative.chars().count() >= chars {
        narrative = take_chars(&exposition.narrative, keep).to_string();
    }

    info!(
        used_tokens = used,
        max_tokens,
        kept_chars = narrative.chars().count(),
        original_chars = chars,
        "Exposition truncated to token budget"
    );

    exposition.narrative = narrative;
    exposition.token_count = max_tokens;
    true
}
