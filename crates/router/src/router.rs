//! Context-aware router — turns a task plus an envelope into a decision.
//!
//! ```text
//! Planning → (OverrideApplied | PolicySelected) → FilterPassed → Resolved
//!                                               ↘ FilterRejected → FallbackSearch → (Resolved | NoCandidate)
//! ```
//!
//! `NoCandidate` surfaces as [`RouterError::NoCandidate`]; a candidate that
//! fails the hard walls is never returned. A task whose type is a forbidden
//! action is refused up front with [`RouterError::HardWallViolation`].

use crate::fallback::fallback_search;
use crate::filter::check_candidate;
use crate::params::{InvocationParams, adjust_parameters};
use crate::rules::{apply_context_routing, enrich_task};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_config::StrataConfig;
use strata_core::{
    BasePolicyEngine, CandidateRegistry, ComplianceCheck, ContextEnvelope, EnvironmentTier,
    ExpertiseTier, OperationalConstraints, RouterError, RuleProbe, ScoredCandidate,
    TaskDescriptor,
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    Planning,
    OverrideApplied,
    PolicySelected,
    FilterPassed,
    FilterRejected,
    FallbackSearch,
    Resolved,
    NoCandidate,
}

/// Envelope signals attached to every decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingFactors {
    pub intent: String,
    pub expertise: ExpertiseTier,
    pub environment: EnvironmentTier,
    pub system_load: Option<f64>,
    pub compliance_required: bool,
    pub tenant_id: Option<String>,
    /// Tier ceilings at the current load.
    pub constraints: OperationalConstraints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub candidate: ScoredCandidate,
    pub params: InvocationParams,
    /// Every reason recorded along the way, in order.
    pub rationale: Vec<String>,
    /// States passed through, ending in `Resolved`.
    pub trail: Vec<SelectionState>,
    pub factors: RoutingFactors,
    /// Checks the caller must run on the response before releasing it.
    pub compliance_checks: Vec<ComplianceCheck>,
    /// Enriched task the candidate was chosen for.
    pub task: TaskDescriptor,
}

/// Tracks state transitions and rationale for one decision.
struct Selection {
    trail: Vec<SelectionState>,
    rationale: Vec<String>,
}

impl Selection {
    fn new() -> Self {
        Self {
            trail: vec![SelectionState::Planning],
            rationale: Vec::new(),
        }
    }

    fn enter(&mut self, state: SelectionState) {
        debug!(from = ?self.trail.last(), to = ?state, "Selection transition");
        self.trail.push(state);
    }

    fn note(&mut self, reason: impl Into<String>) {
        self.rationale.push(reason.into());
    }
}

pub struct ContextAwareRouter {
    registry: Arc<dyn CandidateRegistry>,
    policy: Arc<dyn BasePolicyEngine>,
    config: Arc<StrataConfig>,
}

impl ContextAwareRouter {
    pub fn new(
        registry: Arc<dyn CandidateRegistry>,
        policy: Arc<dyn BasePolicyEngine>,
        config: Arc<StrataConfig>,
    ) -> Self {
        Self {
            registry,
            policy,
            config,
        }
    }

    /// Route with the configured default invocation parameters.
    pub async fn route(
        &self,
        task: TaskDescriptor,
        envelope: &ContextEnvelope,
    ) -> Result<RoutingDecision, RouterError> {
        let params = InvocationParams::defaults(&self.config.routing);
        self.route_with_params(task, envelope, params).await
    }

    pub async fn route_with_params(
        &self,
        mut task: TaskDescriptor,
        envelope: &ContextEnvelope,
        mut params: InvocationParams,
    ) -> Result<RoutingDecision, RouterError> {
        let routing_config = &self.config.routing;
        let mut selection = Selection::new();

        let violations = envelope.rules.check(&RuleProbe {
            action: Some(task.task_type.clone()),
            ..RuleProbe::default()
        });
        if !violations.is_empty() {
            error!(task_type = %task.task_type, violations = ?violations, "Task violates hard walls");
            return Err(RouterError::HardWallViolation { violations });
        }

        let mut override_candidate = None;
        if self.config.context.influence_routing {
            enrich_task(&mut task, envelope);
            let routing = apply_context_routing(&mut task, envelope, routing_config);
            selection.rationale.extend(routing.rationale);
            override_candidate = routing.override_candidate;
        }
        let compliance_required = task.hints.compliance_required || envelope.rules.require_compliance();

        let chosen = match self.resolve_override(override_candidate.as_deref(), &mut selection) {
            Some(choice) => Some(choice),
            None => {
                let choice = self.policy.choose_best(&task).await;
                match &choice {
                    Some(c) => {
                        selection.enter(SelectionState::PolicySelected);
                        selection.note(format!("Policy engine selected {}", c.candidate.id));
                    }
                    None => selection.note("Policy engine found no eligible candidate"),
                }
                choice
            }
        };

        let passing = match chosen {
            Some(choice) => match check_candidate(&choice.candidate, envelope, compliance_required) {
                Ok(()) => {
                    selection.enter(SelectionState::FilterPassed);
                    Some(choice)
                }
                Err(rejection) => {
                    warn!(candidate = %choice.candidate.id, %rejection, "Candidate rejected by hard walls");
                    selection.enter(SelectionState::FilterRejected);
                    selection.note(format!("Rejected: {rejection}"));
                    None
                }
            },
            None => None,
        };

        let resolved = match passing {
            Some(choice) => choice,
            None => {
                selection.enter(SelectionState::FallbackSearch);
                match fallback_search(
                    self.registry.as_ref(),
                    envelope,
                    routing_config,
                    compliance_required,
                ) {
                    Some(choice) => {
                        selection.note(format!("Fallback selected {}", choice.candidate.id));
                        choice
                    }
                    None => {
                        selection.enter(SelectionState::NoCandidate);
                        selection.note("Fallback search exhausted");
                        error!(
                            task_type = %task.task_type,
                            rationale = ?selection.rationale,
                            "No candidate satisfies routing constraints"
                        );
                        return Err(RouterError::NoCandidate {
                            rationale: selection.rationale,
                        });
                    }
                }
            }
        };

        selection
            .rationale
            .extend(adjust_parameters(&mut params, envelope, routing_config));
        selection.enter(SelectionState::Resolved);

        info!(
            candidate = %resolved.candidate.id,
            score = resolved.score,
            temperature = params.temperature,
            max_tokens = params.max_tokens,
            envelope_id = %envelope.id,
            "Routing resolved"
        );

        Ok(RoutingDecision {
            factors: RoutingFactors {
                intent: envelope.intent.primary_intent.clone(),
                expertise: envelope.identity.expertise,
                environment: envelope.environment.tier,
                system_load: envelope.environment.system_load,
                compliance_required,
                tenant_id: envelope.identity.tenant_id.clone(),
                constraints: envelope
                    .environment
                    .operational_constraints(routing_config.high_load_threshold),
            },
            compliance_checks: envelope.rules.compliance_checks(),
            candidate: resolved,
            params,
            rationale: selection.rationale,
            trail: selection.trail,
            task,
        })
    }

    /// Use a named override candidate directly when it is registered.
    fn resolve_override(
        &self,
        id: Option<&str>,
        selection: &mut Selection,
    ) -> Option<ScoredCandidate> {
        let id = id?;
        match self.registry.get(id) {
            Some(candidate) => {
                selection.enter(SelectionState::OverrideApplied);
                selection.note(format!("Context override selected {id}"));
                let mut choice = ScoredCandidate::new(candidate, 1.0);
                choice.rationale = selection.rationale.clone();
                Some(choice)
            }
            None => {
                selection.note(format!("Override candidate {id} is not registered"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScoringPolicyEngine;
    use crate::registry::StaticRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use strata_core::{Candidate, EnvelopeStatus};

    /// Always proposes the same candidate and counts calls.
    struct FixedPolicy {
        choice: Option<Candidate>,
        calls: Mutex<usize>,
    }

    impl FixedPolicy {
        fn new(choice: Option<Candidate>) -> Arc<Self> {
            Arc::new(Self {
                choice,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl BasePolicyEngine for FixedPolicy {
        async fn choose_best(&self, _task: &TaskDescriptor) -> Option<ScoredCandidate> {
            *self.calls.lock().unwrap() += 1;
            self.choice
                .clone()
                .map(|c| ScoredCandidate::new(c, 0.9).because("fixed"))
        }
    }

    fn envelope() -> ContextEnvelope {
        let mut envelope = ContextEnvelope::fallback(Default::default(), "", 0);
        envelope.status = EnvelopeStatus::Complete;
        envelope.intent.primary_intent = "documentation".into();
        envelope
    }

    fn allow(envelope: &mut ContextEnvelope, providers: &[&str]) {
        envelope
            .rules
            .hard_walls
            .insert("allowed_model_providers".into(), json!(providers));
    }

    fn router(
        registry: StaticRegistry,
        policy: Arc<dyn BasePolicyEngine>,
        config: StrataConfig,
    ) -> ContextAwareRouter {
        ContextAwareRouter::new(Arc::new(registry), policy, Arc::new(config))
    }

    #[tokio::test]
    async fn policy_choice_passes_filter() {
        let gpt = Candidate::new("openai", "gpt-4o");
        let registry = StaticRegistry::new().with(gpt.clone());
        let r = router(registry, FixedPolicy::new(Some(gpt)), StrataConfig::default());

        let decision = r.route(TaskDescriptor::new("chat"), &envelope()).await.unwrap();
        assert_eq!(decision.candidate.candidate.id, "openai/gpt-4o");
        assert_eq!(
            decision.trail,
            vec![
                SelectionState::Planning,
                SelectionState::PolicySelected,
                SelectionState::FilterPassed,
                SelectionState::Resolved
            ]
        );
        assert_eq!(decision.params.temperature, 0.7);
    }

    #[tokio::test]
    async fn rejected_choice_falls_back_to_allowed_provider() {
        let registry = StaticRegistry::new()
            .with(Candidate::new("openai", "gpt-4o"))
            .with(Candidate::new("anthropic", "claude-3-haiku"));
        let policy = FixedPolicy::new(Some(Candidate::new("openai", "gpt-4o")));
        let r = router(registry, policy, StrataConfig::default());
        let mut e = envelope();
        allow(&mut e, &["anthropic"]);

        let decision = r.route(TaskDescriptor::new("chat"), &e).await.unwrap();
        assert_eq!(decision.candidate.candidate.provider, "anthropic");
        assert_eq!(
            decision.trail,
            vec![
                SelectionState::Planning,
                SelectionState::PolicySelected,
                SelectionState::FilterRejected,
                SelectionState::FallbackSearch,
                SelectionState::Resolved
            ]
        );
        assert!(decision.rationale.iter().any(|r| r.starts_with("Rejected:")));
    }

    #[tokio::test]
    async fn exhausted_fallback_is_an_error() {
        let registry = StaticRegistry::new().with(Candidate::new("openai", "gpt-4o"));
        let policy = FixedPolicy::new(Some(Candidate::new("openai", "gpt-4o")));
        let r = router(registry, policy, StrataConfig::default());
        let mut e = envelope();
        allow(&mut e, &["anthropic"]);

        let err = r.route(TaskDescriptor::new("chat"), &e).await.unwrap_err();
        match err {
            RouterError::NoCandidate { rationale } => {
                assert!(rationale.iter().any(|r| r == "Fallback search exhausted"));
            }
            other => panic!("Expected NoCandidate, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forbidden_action_is_refused_before_selection() {
        let gpt = Candidate::new("openai", "gpt-4o");
        let policy = FixedPolicy::new(Some(gpt.clone()));
        let r = router(StaticRegistry::new().with(gpt), policy.clone(), StrataConfig::default());
        let mut e = envelope();
        e.rules
            .hard_walls
            .insert("forbidden_actions".into(), json!(["execute_live_code"]));

        let err = r
            .route(TaskDescriptor::new("execute_live_code"), &e)
            .await
            .unwrap_err();
        match err {
            RouterError::HardWallViolation { violations } => {
                assert_eq!(violations, vec!["Forbidden action detected: execute_live_code"]);
            }
            other => panic!("Expected HardWallViolation, got: {other:?}"),
        }
        assert_eq!(*policy.calls.lock().unwrap(), 0);

        assert!(r.route(TaskDescriptor::new("chat"), &e).await.is_ok());
    }

    #[tokio::test]
    async fn decision_carries_compliance_checks_and_constraints() {
        let gpt = Candidate::new("openai", "gpt-4o");
        let r = router(
            StaticRegistry::new().with(gpt.clone()),
            FixedPolicy::new(Some(gpt)),
            StrataConfig::default(),
        );
        let mut e = envelope();
        e.rules
            .hard_walls
            .insert("require_human_approval_for".into(), json!(["production_changes"]));
        e.environment.system_load = Some(0.9);

        let decision = r.route(TaskDescriptor::new("chat"), &e).await.unwrap();
        assert_eq!(decision.compliance_checks.len(), 1);
        assert_eq!(
            decision.compliance_checks[0].action.as_deref(),
            Some("production_changes")
        );
        // Development ceiling halved under load.
        assert_eq!(decision.factors.constraints.max_response_time_ms, 30_000);
    }

    #[tokio::test]
    async fn registered_override_skips_policy_engine() {
        let mut pinned = Candidate::new("local", "claude-2.1");
        pinned.production_ready = true;
        let registry = StaticRegistry::new().with(pinned);
        let policy = FixedPolicy::new(None);
        let mut config = StrataConfig::default();
        config.routing.production_override_candidate = Some("local/claude-2.1".into());
        let r = router(registry, policy.clone(), config);

        let mut e = envelope();
        e.environment.tier = EnvironmentTier::Production;
        let decision = r.route(TaskDescriptor::new("chat"), &e).await.unwrap();

        assert_eq!(decision.candidate.candidate.id, "local/claude-2.1");
        assert_eq!(decision.candidate.score, 1.0);
        assert_eq!(decision.trail[1], SelectionState::OverrideApplied);
        assert_eq!(*policy.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn unregistered_override_uses_policy_engine() {
        let mut gpt = Candidate::new("openai", "gpt-4o");
        gpt.production_ready = true;
        let registry = StaticRegistry::new().with(gpt.clone());
        let policy = FixedPolicy::new(Some(gpt));
        let mut config = StrataConfig::default();
        config.routing.production_override_candidate = Some("local/claude-2.1".into());
        let r = router(registry, policy.clone(), config);

        let mut e = envelope();
        e.environment.tier = EnvironmentTier::Production;
        let decision = r.route(TaskDescriptor::new("chat"), &e).await.unwrap();
        assert_eq!(decision.candidate.candidate.id, "openai/gpt-4o");
        assert_eq!(*policy.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn influence_disabled_keeps_task_untouched_but_filters() {
        let registry = StaticRegistry::new()
            .with(Candidate::new("openai", "gpt-4o"))
            .with(Candidate::new("anthropic", "claude-3-haiku"));
        let policy = FixedPolicy::new(Some(Candidate::new("openai", "gpt-4o")));
        let mut config = StrataConfig::default();
        config.context.influence_routing = false;
        let r = router(registry, policy, config);

        let mut e = envelope();
        e.intent.primary_intent = "troubleshooting".into();
        allow(&mut e, &["anthropic"]);
        let decision = r.route(TaskDescriptor::new("chat"), &e).await.unwrap();

        assert_eq!(decision.task.criticality, strata_core::Criticality::Normal);
        assert_eq!(decision.candidate.candidate.provider, "anthropic");
    }

    #[tokio::test]
    async fn security_intent_requires_compliance_with_scoring_engine() {
        let mut approved = Candidate::new("anthropic", "claude-3-opus");
        approved.compliance_approved = true;
        approved.quality = 0.6;
        let mut fast = Candidate::new("openai", "gpt-4o");
        fast.quality = 0.9;
        let registry: Arc<dyn CandidateRegistry> =
            Arc::new(StaticRegistry::new().with(fast).with(approved));
        let policy = Arc::new(ScoringPolicyEngine::new(registry.clone(), 0.3));
        let r = ContextAwareRouter::new(registry, policy, Arc::new(StrataConfig::default()));

        let mut e = envelope();
        e.intent.primary_intent = "security_analysis".into();
        let decision = r.route(TaskDescriptor::new("audit"), &e).await.unwrap();

        assert_eq!(decision.candidate.candidate.id, "anthropic/claude-3-opus");
        assert!(decision.factors.compliance_required);
        assert_eq!(decision.task.criticality, strata_core::Criticality::High);
    }
}
