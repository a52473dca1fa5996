//! Fallback search after a filter rejection.
//!
//! Order: the configured local candidates, then the first passing candidate
//! of each allowed provider (or of the default fallback providers when no
//! allow-list is set). Every fallback must itself pass the filter; a
//! disallowed candidate is never returned.

use crate::filter::check_candidate;
use strata_config::RoutingConfig;
use strata_core::{CandidateRegistry, ContextEnvelope, ScoredCandidate};
use tracing::debug;

pub const LOCAL_FALLBACK_SCORE: f64 = 0.8;
pub const PROVIDER_FALLBACK_SCORE: f64 = 0.7;

pub fn fallback_search(
    registry: &dyn CandidateRegistry,
    envelope: &ContextEnvelope,
    config: &RoutingConfig,
    compliance_required: bool,
) -> Option<ScoredCandidate> {
    for id in &config.local_fallback_candidates {
        let Some(candidate) = registry.get(id) else {
            continue;
        };
        match check_candidate(&candidate, envelope, compliance_required) {
            Ok(()) => {
                return Some(
                    ScoredCandidate::new(candidate, LOCAL_FALLBACK_SCORE)
                        .because("Fallback compliant model"),
                );
            }
            Err(rejection) => debug!(candidate = %id, %rejection, "Local fallback rejected"),
        }
    }

    let allowed = envelope.rules.allowed_model_providers();
    let providers = if allowed.is_empty() {
        &config.default_fallback_providers
    } else {
        &allowed
    };

    for provider in providers {
        let passing = registry
            .by_provider(provider)
            .into_iter()
            .find(|c| check_candidate(c, envelope, compliance_required).is_ok());
        if let Some(candidate) = passing {
            return Some(
                ScoredCandidate::new(candidate, PROVIDER_FALLBACK_SCORE)
                    .because("Approved cloud fallback"),
            );
        }
        debug!(%provider, "No passing candidate for fallback provider");
    }

    None
}
