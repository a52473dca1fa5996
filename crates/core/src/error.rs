//! Error types for the strata domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only [`RouterError`] is ever
//! surfaced to callers of the routing stage. Envelope assembly recovers every
//! [`ContextError`] into a fallback envelope.

use thiserror::Error;

/// The top-level error type for all strata operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Collaborator errors ---
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    // --- Context pipeline errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Routing errors ---
    #[error("Routing error: {0}")]
    Router(#[from] RouterError),
}

// --- Bounded context errors ---

/// Failure reported by an injected lookup collaborator.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Source lookup failed: {0}")]
    Failed(String),

    #[error("Source timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Failure inside the envelope pipeline itself.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Envelope build exceeded {timeout_ms}ms")]
    BuildTimeout { timeout_ms: u64 },

    #[error("Internal pipeline fault: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// Fallback search was exhausted; no candidate satisfies the hard walls.
    #[error("No candidate satisfies routing constraints ({})", .rationale.join("; "))]
    NoCandidate { rationale: Vec<String> },

    /// The task itself breaks a hard wall, so nothing is routed.
    #[error("Hard wall violated ({})", .violations.join("; "))]
    HardWallViolation { violations: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_displays_timeout() {
        let err = Error::Source(SourceError::Timeout { timeout_ms: 250 });
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn no_candidate_lists_rationale() {
        let err = RouterError::NoCandidate {
            rationale: vec!["provider openai not allowed".into(), "no local fallback".into()],
        };
        let text = err.to_string();
        assert!(text.contains("provider openai not allowed"));
        assert!(text.contains("no local fallback"));
    }

    #[test]
    fn serialization_error_converts() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ContextError = bad.into();
        assert!(matches!(err, ContextError::Serialization(_)));
    }
}
