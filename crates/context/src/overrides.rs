//! Override merger — request-scoped overrides applied after computation.
//!
//! | Layer | Strategy |
//! |-------|----------|
//! | Identity preferences | deep merge; expertise replaces |
//! | Intent | field-by-field replace |
//! | Domain | `repo_path` replace (confined), `key_components` merge |
//! | Rules | key-level replace inside `soft_walls` / `hard_walls` |
//! | Environment | field replace |

use crate::layers::Layers;
use strata_config::SecurityConfig;
use strata_core::merge::{deep_merge, shallow_merge};
use strata_core::{
    ContextOverride, DomainLayer, DomainOverride, EnvironmentLayer, EnvironmentOverride,
    IdentityLayer, IdentityOverride, IntentLayer, IntentOverride, RulesLayer, RulesOverride,
};
use strata_security::confine_repo_path;
use tracing::{debug, warn};

/// Apply every present override to its layer.
pub fn apply_overrides(layers: &mut Layers, overrides: &ContextOverride, security: &SecurityConfig) {
    if let Some(ov) = &overrides.identity {
        apply_identity(&mut layers.identity, ov);
    }
    if let Some(ov) = &overrides.intent {
        apply_intent(&mut layers.intent, ov);
    }
    if let Some(ov) = &overrides.domain {
        apply_domain(&mut layers.domain, ov, security);
    }
    if let Some(ov) = &overrides.rules {
        apply_rules(&mut layers.rules, ov);
    }
    if let Some(ov) = &overrides.environment {
        apply_environment(&mut layers.environment, ov);
    }
}

pub fn apply_identity(layer: &mut IdentityLayer, ov: &IdentityOverride) {
    if let Some(preferences) = &ov.preferences {
        deep_merge(&mut layer.preferences, preferences);
    }
    if let Some(expertise) = ov.expertise {
        layer.expertise = expertise;
    }
}

pub fn apply_intent(layer: &mut IntentLayer, ov: &IntentOverride) {
    if let Some(primary) = &ov.primary_intent {
        layer.primary_intent = primary.clone();
    }
    if let Some(task_type) = &ov.task_type {
        layer.task_type = Some(task_type.clone());
    }
    if let Some(confidence) = ov.confidence {
        layer.confidence = confidence.clamp(0.0, 1.0);
    }
    if let Some(criteria) = &ov.success_criteria {
        layer.success_criteria = criteria.clone();
    }
    if let Some(constraints) = &ov.constraints {
        layer.constraints = constraints.clone();
    }
    if let Some(target) = &ov.escalation_target {
        layer.escalation_target = Some(target.clone());
    }
}

/// An override path goes through the same confinement as a request path.
/// Analysis is not re-run; a layer already holding the invalid-path
/// sentinel keeps it.
pub fn apply_domain(layer: &mut DomainLayer, ov: &DomainOverride, security: &SecurityConfig) {
    // An invalid-path layer stays empty; nothing is merged into it.
    if layer.is_invalid() {
        if ov.repo_path.is_some() || ov.key_components.is_some() {
            warn!("Ignoring domain override on an invalid domain layer");
        }
        return;
    }

    if let Some(raw) = &ov.repo_path {
        match confine_repo_path(raw, security) {
            Ok(path) => layer.repo_path = Some(path.to_string_lossy().into_owned()),
            Err(e) => warn!(reason = %e.reason(), "Ignoring invalid repo_path override"),
        }
    }

    if let Some(components) = &ov.key_components {
        layer
            .components
            .extend(components.iter().map(|(k, v)| (k.clone(), v.clone())));
        layer.derive_relationships();
    }
}

pub fn apply_rules(layer: &mut RulesLayer, ov: &RulesOverride) {
    if let Some(soft) = &ov.soft_walls {
        shallow_merge(&mut layer.soft_walls, soft);
    }
    if let Some(hard) = &ov.hard_walls {
        shallow_merge(&mut layer.hard_walls, hard);
    }
}

pub fn apply_environment(layer: &mut EnvironmentLayer, ov: &EnvironmentOverride) {
    if let Some(tier) = ov.tier {
        layer.tier = tier;
    }
    if let Some(mode) = &ov.routing_mode {
        layer.routing_mode = mode.clone();
    }
    if let Some(flags) = &ov.feature_flags {
        layer.feature_flags = flags.clone();
    }
    if let Some(limits) = &ov.rate_limits {
        layer.rate_limits = limits.clone();
    }
    if let Some(sessions) = ov.active_sessions {
        layer.active_sessions = sessions;
    }
    if let Some(load) = ov.system_load {
        layer.system_load = Some(load.clamp(0.0, 1.0));
    }
    if let Some(version) = &ov.deployment_version {
        layer.deployment_version = Some(version.clone());
    }
    debug!(tier = %layer.tier, "Environment override applied");
}
