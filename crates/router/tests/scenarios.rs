//! End-to-end scenarios: envelope assembly feeding the router.

use serde_json::{Map, Value, json};
use std::sync::Arc;
use strata_config::StrataConfig;
use strata_context::{BuildRequest, Collaborators, EnvelopeBuilder};
use strata_core::{
    BasePolicyEngine, Candidate, CandidateRegistry, ContextEnvelope, DomainState, EnvelopeStatus,
    ExpertiseTier, RouterError, ScoredCandidate, StaticSettings, TaskDescriptor,
};
use strata_router::{ContextAwareRouter, ScoringPolicyEngine, SelectionState, StaticRegistry};

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn builder(config: StrataConfig) -> EnvelopeBuilder {
    EnvelopeBuilder::new(Arc::new(config)).with_collaborators(Collaborators {
        settings: Arc::new(StaticSettings::default()),
        ..Collaborators::default()
    })
}

async fn assemble(request: &BuildRequest) -> ContextEnvelope {
    builder(StrataConfig::default()).build(request).await
}

/// Always proposes an OpenAI model, whatever the hard walls say.
struct OpenAiFirst;

#[async_trait::async_trait]
impl BasePolicyEngine for OpenAiFirst {
    async fn choose_best(&self, _task: &TaskDescriptor) -> Option<ScoredCandidate> {
        Some(ScoredCandidate::new(Candidate::new("openai", "gpt-4o"), 0.95))
    }
}

#[tokio::test]
async fn admin_implementation_request() {
    let mut request = BuildRequest::new("Implement a login endpoint");
    request.claims = object(json!({"sub": "u1", "roles": ["admin"]}));

    let envelope = assemble(&request).await;
    assert_eq!(envelope.status, EnvelopeStatus::Complete);
    assert_eq!(envelope.intent.primary_intent, "implementation");
    assert!(envelope.exposition.narrative.contains(
        "Generate production-ready code with proper error handling, tests, and integration points clearly defined."
    ));
    assert_eq!(envelope.identity.preference_str("detail_level"), Some("high"));

    let registry: Arc<dyn CandidateRegistry> = Arc::new(
        StaticRegistry::new()
            .with(Candidate {
                quality: 0.9,
                ..Candidate::new("anthropic", "claude-3-opus")
            })
            .with(Candidate::new("ollama", "codellama")),
    );
    let policy = Arc::new(ScoringPolicyEngine::new(registry.clone(), 0.3));
    let router = ContextAwareRouter::new(registry, policy, Arc::new(StrataConfig::default()));

    let decision = router
        .route(TaskDescriptor::new("chat"), &envelope)
        .await
        .unwrap();
    assert_eq!(decision.candidate.candidate.id, "anthropic/claude-3-opus");
    // Long-form intent raises the ceiling; the 4000-token hard wall allows it.
    assert_eq!(decision.params.max_tokens, 4000);
    assert_eq!(decision.task.context_size, envelope.token_budget_used);
    assert_eq!(decision.factors.intent, "implementation");
}

#[tokio::test]
async fn bug_report_is_troubleshooting() {
    let envelope = assemble(&BuildRequest::new("There is a bug in auth")).await;
    assert_eq!(envelope.intent.primary_intent, "troubleshooting");
    assert_eq!(
        envelope.intent.escalation_target.as_deref(),
        Some("senior_developer")
    );
}

#[tokio::test]
async fn explicit_hint_wins_over_text() {
    let mut request = BuildRequest::new("There is a bug in auth");
    request.body.task_type = Some("Code Review".into());
    let envelope = assemble(&request).await;
    assert_eq!(envelope.intent.primary_intent, "code_review");
    assert_eq!(envelope.intent.confidence, 0.9);
}

#[tokio::test]
async fn anonymous_claims_still_assemble() {
    let envelope = assemble(&BuildRequest::new("hello")).await;
    assert!(!envelope.is_fallback());
    assert!(envelope.identity.user_id.is_none());
    assert_eq!(envelope.identity.preference_str("tone"), Some("professional"));
    assert_eq!(envelope.identity.expertise, ExpertiseTier::Intermediate);
}

#[tokio::test]
async fn traversal_path_is_invalid() {
    let base = tempfile::tempdir().unwrap();
    let mut config = StrataConfig::default();
    config.security.allowed_repo_base_dir = base.path().to_path_buf();

    let mut request = BuildRequest::new("Analyze this repo");
    request.body.repository_path = Some("../../etc".into());
    let envelope = builder(config).build(&request).await;

    assert!(envelope.domain.is_invalid());
    assert_eq!(envelope.domain.summary.as_deref(), Some("invalid path"));
    assert!(envelope.domain.components.is_empty());
    assert_eq!(envelope.status, EnvelopeStatus::Partial);
}

#[tokio::test]
async fn confined_repository_is_scanned() {
    let base = tempfile::tempdir().unwrap();
    let repo = base.path().join("shop");
    std::fs::create_dir_all(repo.join("tests")).unwrap();
    std::fs::write(repo.join("Cargo.toml"), "[package]\nname = \"shop\"\n").unwrap();
    std::fs::write(repo.join("package.json"), "{}").unwrap();
    std::fs::write(repo.join("README.md"), "# shop").unwrap();

    let mut config = StrataConfig::default();
    config.security.allowed_repo_base_dir = base.path().to_path_buf();
    let mut request = BuildRequest::new("Analyze the repository");
    request.body.repository_path = Some("shop".into());
    request.body.project_id = Some("proj-7".into());

    let envelope = builder(config).build(&request).await;
    let domain = &envelope.domain;
    assert_eq!(domain.state, DomainState::Analyzed);
    for component in ["backend", "frontend", "testing", "documentation"] {
        assert!(domain.components.contains_key(component), "missing {component}");
    }
    assert!(domain.relationships.contains_key("frontend_backend"));
    assert_eq!(domain.project_metadata["project_id"], "proj-7");
    assert!(envelope.exposition.narrative.contains("Domain:"));
}

#[tokio::test]
async fn allow_list_excludes_policy_pick() {
    let mut request = BuildRequest::new("Write docs for the API");
    request.tenant_policies = Some(object(json!({
        "hard_walls": {"allowed_model_providers": ["anthropic"]}
    })));
    let envelope = assemble(&request).await;

    let config = Arc::new(StrataConfig::default());
    let with_anthropic = ContextAwareRouter::new(
        Arc::new(
            StaticRegistry::new()
                .with(Candidate::new("openai", "gpt-4o"))
                .with(Candidate::new("anthropic", "claude-3-haiku")),
        ),
        Arc::new(OpenAiFirst),
        config.clone(),
    );
    let decision = with_anthropic
        .route(TaskDescriptor::new("docs"), &envelope)
        .await
        .unwrap();
    assert_eq!(decision.candidate.candidate.provider, "anthropic");
    assert!(decision.trail.contains(&SelectionState::FilterRejected));

    let without_anthropic = ContextAwareRouter::new(
        Arc::new(StaticRegistry::new().with(Candidate::new("openai", "gpt-4o"))),
        Arc::new(OpenAiFirst),
        config,
    );
    let err = without_anthropic
        .route(TaskDescriptor::new("docs"), &envelope)
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::NoCandidate { .. }));
}

#[tokio::test]
async fn production_tier_filters_unready_candidates() {
    let settings = StaticSettings::default().with("ENV", "production");
    let envelope = EnvelopeBuilder::new(Arc::new(StrataConfig::default()))
        .with_collaborators(Collaborators {
            settings: Arc::new(settings),
            ..Collaborators::default()
        })
        .build(&BuildRequest::new("Explain the roadmap"))
        .await;
    assert!(envelope.environment.is_production());

    let ready = Candidate {
        production_ready: true,
        quality: 0.4,
        ..Candidate::new("anthropic", "claude-3-sonnet")
    };
    let registry: Arc<dyn CandidateRegistry> = Arc::new(
        StaticRegistry::new()
            .with(Candidate {
                quality: 0.9,
                ..Candidate::new("anthropic", "experimental")
            })
            .with(ready),
    );
    let policy = Arc::new(ScoringPolicyEngine::new(registry.clone(), 0.3));
    let router = ContextAwareRouter::new(registry, policy, Arc::new(StrataConfig::default()));

    let decision = router
        .route(TaskDescriptor::new("chat"), &envelope)
        .await
        .unwrap();
    assert_eq!(decision.candidate.candidate.id, "anthropic/claude-3-sonnet");
    assert!(
        decision
            .rationale
            .iter()
            .any(|r| r.starts_with("Production environment"))
    );
}

#[tokio::test]
async fn baseline_rules_refuse_forbidden_task() {
    let envelope = assemble(&BuildRequest::new("Run this script on the server")).await;
    let registry: Arc<dyn CandidateRegistry> =
        Arc::new(StaticRegistry::new().with(Candidate::new("anthropic", "claude-3-haiku")));
    let policy = Arc::new(ScoringPolicyEngine::new(registry.clone(), 0.3));
    let router = ContextAwareRouter::new(registry, policy, Arc::new(StrataConfig::default()));

    let err = router
        .route(TaskDescriptor::new("execute_live_code"), &envelope)
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::HardWallViolation { .. }));

    let decision = router
        .route(TaskDescriptor::new("chat"), &envelope)
        .await
        .unwrap();
    assert!(!decision.compliance_checks.is_empty());
}
