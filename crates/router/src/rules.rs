//! Envelope-driven task enrichment and context routing rules.

use strata_config::RoutingConfig;
use strata_core::environment::DEFAULT_ROUTING_MODE;
use strata_core::{ContextEnvelope, Criticality, ExpertiseTier, RoutingHints, TaskDescriptor};
use tracing::debug;

/// Intents that raise criticality to at least `High`.
pub const CRITICAL_INTENTS: &[&str] = &["security_analysis", "troubleshooting"];

/// Intents that require compliance-approved candidates.
pub const SECURITY_INTENTS: &[&str] = &["security_analysis"];

/// Intents that ask for code-generation capability.
pub const CODE_INTENTS: &[&str] = &["implementation", "code_review"];

/// Intents that ask for reasoning capability.
pub const REASONING_INTENTS: &[&str] = &["architecture_design", "planning", "troubleshooting"];

/// Enrich `task` in place from the envelope.
///
/// - criticality: `High` for critical intents, `Normal` for beginners
/// - intent constraints merged over the task's own
/// - context size taken from the envelope's token usage when non-zero
/// - compliance regimes taken from the `compliance_level` hard wall
/// - `require_compliance` sets the compliance hint
/// - code and design intents request the matching capability
pub fn enrich_task(task: &mut TaskDescriptor, envelope: &ContextEnvelope) {
    if envelope.intent.is_any(CRITICAL_INTENTS) {
        task.criticality = task.criticality.max(Criticality::High);
    } else if envelope.identity.expertise == ExpertiseTier::Beginner {
        task.criticality = Criticality::Normal;
    }

    for (key, value) in &envelope.intent.constraints {
        task.constraints.insert(key.clone(), value.clone());
    }

    if envelope.token_budget_used > 0 {
        task.context_size = envelope.token_budget_used;
    }

    let compliance = envelope.rules.compliance_level();
    if !compliance.is_empty() {
        task.compliance = compliance;
    }
    if envelope.rules.require_compliance() {
        task.hints.compliance_required = true;
    }

    if envelope.intent.is_any(CODE_INTENTS) {
        task.capabilities.code_generation = true;
    }
    if envelope.intent.is_any(REASONING_INTENTS) {
        task.capabilities.reasoning = true;
    }

    debug!(
        criticality = ?task.criticality,
        context_size = task.context_size,
        compliance = ?task.compliance,
        "Task enriched from envelope"
    );
}

/// Outcome of the context routing rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextRouting {
    /// Candidate id to use instead of asking the policy engine.
    pub override_candidate: Option<String>,
    pub hints: RoutingHints,
    pub rationale: Vec<String>,
}

/// Evaluate tier, expertise, intent, budget flag and load.
/// The resulting hints are also merged into `task.hints`.
pub fn apply_context_routing(
    task: &mut TaskDescriptor,
    envelope: &ContextEnvelope,
    config: &RoutingConfig,
) -> ContextRouting {
    let mut routing = ContextRouting::default();
    let env = &envelope.environment;

    if env.is_production() {
        routing
            .rationale
            .push("Production environment - prefer proven models".into());
        if env.routing_mode == DEFAULT_ROUTING_MODE
            && let Some(candidate) = &config.production_override_candidate
        {
            routing.override_candidate = Some(candidate.clone());
        }
    }

    match envelope.identity.expertise {
        ExpertiseTier::Expert => {
            routing
                .rationale
                .push("Expert user - can handle advanced models".into());
            routing.hints.allow_advanced = true;
        }
        ExpertiseTier::Beginner => {
            routing
                .rationale
                .push("Beginner user - prefer patient, explanatory models".into());
        }
        ExpertiseTier::Intermediate => {}
    }

    if envelope.intent.is_any(SECURITY_INTENTS) {
        routing
            .rationale
            .push("Security task - require compliance-approved models".into());
        routing.hints.compliance_required = true;
    }

    if env.feature_enabled(
        "budget_conscious",
        Some(&envelope.identity),
        &config.feature_gate(),
    ) {
        routing
            .rationale
            .push("Budget conscious - prefer cost-effective models".into());
        routing.hints.prefer_local = true;
    }

    if env.load_above(config.high_load_threshold) {
        let constraints = env.operational_constraints(config.high_load_threshold);
        routing.rationale.push(format!(
            "High system load - prefer lightweight models (response ceiling {}ms)",
            constraints.max_response_time_ms
        ));
        routing.hints.prefer_lightweight = true;
    }

    let hints = &mut task.hints;
    hints.prefer_local |= routing.hints.prefer_local;
    hints.prefer_lightweight |= routing.hints.prefer_lightweight;
    hints.allow_advanced |= routing.hints.allow_advanced;
    hints.compliance_required |= routing.hints.compliance_required;

    routing
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_core::{EnvelopeStatus, EnvironmentTier};

    fn envelope() -> ContextEnvelope {
        let mut envelope = ContextEnvelope::fallback(Default::default(), "", 0);
        envelope.status = EnvelopeStatus::Complete;
        envelope.intent.primary_intent = "implementation".into();
        envelope.token_budget_used = 0;
        envelope
    }

    #[test]
    fn critical_intent_raises_criticality() {
        let mut e = envelope();
        e.intent.primary_intent = "troubleshooting".into();
        let mut task = TaskDescriptor::new("chat");
        enrich_task(&mut task, &e);
        assert_eq!(task.criticality, Criticality::High);

        let mut task = TaskDescriptor::new("chat").with_criticality(Criticality::Critical);
        enrich_task(&mut task, &e);
        assert_eq!(task.criticality, Criticality::Critical);
    }

    #[test]
    fn beginner_resets_criticality() {
        let mut e = envelope();
        e.identity.expertise = ExpertiseTier::Beginner;
        let mut task = TaskDescriptor::new("chat").with_criticality(Criticality::Low);
        enrich_task(&mut task, &e);
        assert_eq!(task.criticality, Criticality::Normal);
    }

    #[test]
    fn enrichment_copies_constraints_size_and_compliance() {
        let mut e = envelope();
        e.intent
            .constraints
            .insert("requires_tests".into(), json!(true));
        e.token_budget_used = 1234;
        e.rules
            .hard_walls
            .insert("compliance_level".into(), json!("soc2"));
        e.rules
            .hard_walls
            .insert("require_compliance".into(), json!(true));

        let mut task = TaskDescriptor::new("chat");
        task.context_size = 99;
        enrich_task(&mut task, &e);
        assert_eq!(task.constraints["requires_tests"], json!(true));
        assert_eq!(task.context_size, 1234);
        assert_eq!(task.compliance, vec!["soc2"]);
        assert!(task.hints.compliance_required);
    }

    #[test]
    fn intents_request_capabilities() {
        let mut task = TaskDescriptor::new("chat");
        enrich_task(&mut task, &envelope());
        assert!(task.capabilities.code_generation);
        assert!(!task.capabilities.reasoning);

        let mut e = envelope();
        e.intent.primary_intent = "architecture_design".into();
        let mut task = TaskDescriptor::new("chat");
        enrich_task(&mut task, &e);
        assert!(task.capabilities.reasoning);
        assert!(!task.capabilities.code_generation);
    }

    #[test]
    fn zero_usage_keeps_task_size() {
        let mut task = TaskDescriptor::new("chat");
        task.context_size = 500;
        enrich_task(&mut task, &envelope());
        assert_eq!(task.context_size, 500);
    }

    #[test]
    fn production_override_needs_local_preferred_mode() {
        let mut e = envelope();
        e.environment.tier = EnvironmentTier::Production;
        let config = RoutingConfig {
            production_override_candidate: Some("local/claude-2.1".into()),
            ..RoutingConfig::default()
        };

        let routing = apply_context_routing(&mut TaskDescriptor::new("chat"), &e, &config);
        assert_eq!(routing.override_candidate.as_deref(), Some("local/claude-2.1"));
        assert!(routing.rationale[0].starts_with("Production environment"));

        e.environment.routing_mode = "cloud-only".into();
        let routing = apply_context_routing(&mut TaskDescriptor::new("chat"), &e, &config);
        assert!(routing.override_candidate.is_none());
    }

    #[test]
    fn no_override_without_configured_candidate() {
        let mut e = envelope();
        e.environment.tier = EnvironmentTier::Production;
        let routing =
            apply_context_routing(&mut TaskDescriptor::new("chat"), &e, &RoutingConfig::default());
        assert!(routing.override_candidate.is_none());
    }

    #[test]
    fn signals_set_hints_on_task() {
        let mut e = envelope();
        e.identity.expertise = ExpertiseTier::Expert;
        e.intent.primary_intent = "security_analysis".into();
        e.environment
            .feature_flags
            .insert("budget_conscious".into(), true);
        e.environment.system_load = Some(0.85);

        let mut task = TaskDescriptor::new("chat");
        let routing = apply_context_routing(&mut task, &e, &RoutingConfig::default());
        assert_eq!(routing.rationale.len(), 4);
        assert!(task.hints.allow_advanced);
        assert!(task.hints.compliance_required);
        assert!(task.hints.prefer_local);
        assert!(task.hints.prefer_lightweight);
    }

    #[test]
    fn high_load_rationale_reports_halved_ceiling() {
        let mut e = envelope();
        e.environment.tier = EnvironmentTier::Production;
        e.environment.system_load = Some(0.85);
        let routing =
            apply_context_routing(&mut TaskDescriptor::new("chat"), &e, &RoutingConfig::default());
        assert!(
            routing
                .rationale
                .iter()
                .any(|r| r.contains("response ceiling 5000ms"))
        );
    }

    #[test]
    fn budget_flag_goes_through_feature_gate() {
        let mut e = envelope();
        e.environment
            .feature_flags
            .insert("budget_conscious".into(), false);
        let mut task = TaskDescriptor::new("chat");
        apply_context_routing(&mut task, &e, &RoutingConfig::default());
        assert!(!task.hints.prefer_local);

        // Survives load shedding.
        e.environment
            .feature_flags
            .insert("budget_conscious".into(), true);
        e.environment.system_load = Some(0.95);
        let mut task = TaskDescriptor::new("chat");
        apply_context_routing(&mut task, &e, &RoutingConfig::default());
        assert!(task.hints.prefer_local);
    }

    #[test]
    fn load_at_threshold_is_not_high() {
        let mut e = envelope();
        e.environment.system_load = Some(0.8);
        let mut task = TaskDescriptor::new("chat");
        apply_context_routing(&mut task, &e, &RoutingConfig::default());
        assert!(!task.hints.prefer_lightweight);
    }
}
