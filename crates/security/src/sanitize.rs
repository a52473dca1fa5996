//! Error-message sanitization at the trust boundary.
//!
//! Anything that may carry collaborator or internal error text passes
//! through [`sanitize_message`] before reaching a caller or a log line.

use strata_config::SecurityConfig;

/// Replacement text for any message judged unsafe.
pub const GENERIC_ERROR: &str = "Internal server error";

const STACK_TRACE_MARKERS: &[&str] = &["traceback", "line ", "panicked at", "stack backtrace"];

/// Return `message` unchanged, or [`GENERIC_ERROR`] if it contains a
/// sensitive keyword, a path separator, or a stack-trace marker.
pub fn sanitize_message(message: &str, policy: &SecurityConfig) -> String {
    if !policy.sanitize_error_messages {
        return message.to_string();
    }

    let lower = message.to_lowercase();

    if policy
        .sensitive_keywords
        .iter()
        .any(|keyword| lower.contains(&keyword.to_lowercase()))
    {
        return GENERIC_ERROR.to_string();
    }

    if message.contains('/') || message.contains('\\') {
        return GENERIC_ERROR.to_string();
    }

    if STACK_TRACE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return GENERIC_ERROR.to_string();
    }

    message.to_string()
}
