//! Hard-wall filter applied to every chosen candidate.

use strata_core::{Candidate, ContextEnvelope};
use thiserror::Error;

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("provider '{provider}' is not in the allowed providers")]
    ProviderNotAllowed { provider: String },

    #[error("candidate '{id}' is not compliance approved")]
    NotComplianceApproved { id: String },

    #[error("candidate '{id}' is not production ready")]
    NotProductionReady { id: String },
}

/// Check `candidate` against the envelope's hard walls.
///
/// Compliance is required when the router says so (security intent or the
/// `require_compliance` hard wall); the caller passes the combined flag.
pub fn check_candidate(
    candidate: &Candidate,
    envelope: &ContextEnvelope,
    compliance_required: bool,
) -> Result<(), Rejection> {
    let allowed = envelope.rules.allowed_model_providers();
    if !allowed.is_empty() && !allowed.iter().any(|p| *p == candidate.provider) {
        return Err(Rejection::ProviderNotAllowed {
            provider: candidate.provider.clone(),
        });
    }

    if compliance_required && !candidate.compliance_approved {
        return Err(Rejection::NotComplianceApproved {
            id: candidate.id.clone(),
        });
    }

    if envelope.environment.is_production() && !candidate.production_ready {
        return Err(Rejection::NotProductionReady {
            id: candidate.id.clone(),
        });
    }

    Ok(())
}
