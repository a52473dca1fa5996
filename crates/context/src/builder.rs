//! Envelope assembly — the fail-open build pipeline.
//!
//! 1. **Sources** — every enabled adapter runs under its own timeout and a
//!    panic guard, concurrently or in priority order
//! 2. **Overrides** — applied once all base layers are available
//! 3. **Synthesis** — narrative, structured map, token estimate
//! 4. **Budget** — tail truncation down to `max_total_tokens`
//!
//! The whole pipeline runs under `build_timeout_ms`. A timeout, a panic, or
//! an internal fault anywhere yields [`ContextEnvelope::fallback`]; callers
//! never see an error from this stage.

use crate::budget::enforce_budget;
use crate::exposition::synthesize;
use crate::layers::Layers;
use crate::overrides::apply_overrides;
use crate::sources::{
    DomainInput, build_domain, build_environment, build_identity, build_rules, detect_intent,
    refine_with_history,
};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use strata_config::StrataConfig;
use strata_core::{
    ContextEnvelope, ContextError, ContextOverride, DegradeReason, DomainAnalyzer, DomainLayer,
    EnvironmentLayer, HistoryLookup, IdentityLayer, IntentLayer, InteractionSignals, LayerKind,
    LayerReport, LayerStatus, LoadProbe, ProcessEnv, RulesLayer, SettingsSource, Sourced,
};
use strata_security::sanitize_message;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Slack on top of an adapter's own timeout, so adapters that enforce their
/// deadline internally report it themselves.
const ADAPTER_GRACE: Duration = Duration::from_millis(50);

// ── Inputs ────────────────────────────────────────────────────────────────

/// The request body fields the pipeline reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub repository_path: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    /// Most recent last.
    #[serde(default)]
    pub session_history: Vec<String>,
    /// Behavior observed earlier in the session, folded into identity.
    #[serde(default)]
    pub interaction: Option<InteractionSignals>,
}

/// Everything one envelope is built from.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Authentication claims (`sub`, `tenant_id`, `roles`, ...).
    pub claims: Map<String, Value>,
    pub body: RequestBody,
    pub tenant_policies: Option<Map<String, Value>>,
    pub overrides: ContextOverride,
}

impl BuildRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            body: RequestBody {
                message: message.into(),
                ..RequestBody::default()
            },
            ..Self::default()
        }
    }
}

/// Injected lookups. All optional except settings.
#[derive(Clone)]
pub struct Collaborators {
    pub history: Option<Arc<dyn HistoryLookup>>,
    pub domain: Option<Arc<dyn DomainAnalyzer>>,
    pub settings: Arc<dyn SettingsSource>,
    pub load: Option<Arc<dyn LoadProbe>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            history: None,
            domain: None,
            settings: Arc::new(ProcessEnv),
            load: None,
        }
    }
}

// ── Layer plumbing ────────────────────────────────────────────────────────

enum LayerValue {
    Identity(IdentityLayer),
    Intent(IntentLayer),
    Domain(DomainLayer),
    Rules(RulesLayer),
    Environment(EnvironmentLayer),
}

impl LayerValue {
    /// The safe default a failed adapter degrades to.
    fn default_for(kind: LayerKind) -> Self {
        match kind {
            LayerKind::Identity => LayerValue::Identity(IdentityLayer::default()),
            LayerKind::Intent => LayerValue::Intent(IntentLayer::default()),
            LayerKind::Domain => LayerValue::Domain(DomainLayer::default()),
            LayerKind::Rules => LayerValue::Rules(build_rules(None)),
            LayerKind::Environment => LayerValue::Environment(EnvironmentLayer::default()),
        }
    }
}

fn map_sourced<T>(sourced: Sourced<T>, wrap: fn(T) -> LayerValue) -> Sourced<LayerValue> {
    match sourced {
        Sourced::Fresh(value) => Sourced::Fresh(wrap(value)),
        Sourced::Degraded { value, reason } => Sourced::degraded(wrap(value), reason),
    }
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Builds [`ContextEnvelope`]s. Cheap to clone; holds only shared handles.
#[derive(Clone)]
pub struct EnvelopeBuilder {
    config: Arc<StrataConfig>,
    collaborators: Collaborators,
}

impl EnvelopeBuilder {
    pub fn new(config: Arc<StrataConfig>) -> Self {
        Self {
            config,
            collaborators: Collaborators::default(),
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    /// Build an envelope. Never fails: any pipeline fault yields the
    /// fallback envelope with a sanitized error description.
    pub async fn build(&self, request: &BuildRequest) -> ContextEnvelope {
        let id = Uuid::new_v4();
        let started = Instant::now();
        let timeout_ms = self.config.context.build_timeout_ms;
        debug!(envelope_id = %id, parallel = self.config.context.parallel_build, "Building context envelope");

        let outcome = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            AssertUnwindSafe(self.try_build(id, request)).catch_unwind(),
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let fault = match outcome {
            Ok(Ok(Ok(mut envelope))) => {
                envelope.processing_time_ms = elapsed_ms;
                info!(
                    envelope_id = %id,
                    elapsed_ms,
                    tokens = envelope.token_budget_used,
                    status = ?envelope.status,
                    "Context envelope built"
                );
                return envelope;
            }
            Ok(Ok(Err(e))) => e,
            Ok(Err(_)) => ContextError::Internal("pipeline panicked".into()),
            Err(_) => ContextError::BuildTimeout { timeout_ms },
        };

        let message = self.sanitize(&fault.to_string());
        error!(envelope_id = %id, elapsed_ms, error = %message, "Context build failed, returning fallback envelope");
        ContextEnvelope::fallback(id, message, elapsed_ms)
    }

    async fn try_build(
        &self,
        id: Uuid,
        request: &BuildRequest,
    ) -> Result<ContextEnvelope, ContextError> {
        let context = &self.config.context;

        let mut results = if context.parallel_build {
            join_all(LayerKind::ALL.iter().map(|kind| self.run_layer(*kind, request))).await
        } else {
            let mut results = Vec::with_capacity(LayerKind::ALL.len());
            for kind in context.sources.by_priority() {
                results.push(self.run_layer(kind, request).await);
            }
            results
        };

        let mut layers = Layers::default();
        let mut reports = Vec::with_capacity(LayerKind::ALL.len());
        for kind in LayerKind::ALL {
            let index = results
                .iter()
                .position(|(k, _)| *k == kind)
                .ok_or_else(|| ContextError::Internal(format!("{kind} layer missing")))?;
            let (_, outcome) = results.swap_remove(index);

            let (value, status) = match outcome {
                None => (LayerValue::default_for(kind), LayerStatus::Disabled),
                Some(sourced) => sourced.into_parts(),
            };
            let status = match status {
                LayerStatus::Degraded { reason } => {
                    let reason = self.sanitize_reason(&reason);
                    warn!(envelope_id = %id, layer = %kind, reason = %reason, "Layer degraded");
                    LayerStatus::Degraded { reason }
                }
                other => other,
            };
            reports.push(LayerReport { layer: kind, status });

            match (kind, value) {
                (LayerKind::Identity, LayerValue::Identity(v)) => layers.identity = v,
                (LayerKind::Intent, LayerValue::Intent(v)) => layers.intent = v,
                (LayerKind::Domain, LayerValue::Domain(v)) => layers.domain = v,
                (LayerKind::Rules, LayerValue::Rules(v)) => layers.rules = v,
                (LayerKind::Environment, LayerValue::Environment(v)) => layers.environment = v,
                (kind, _) => {
                    return Err(ContextError::Internal(format!(
                        "{kind} adapter returned a mismatched layer"
                    )));
                }
            }
        }

        if !request.overrides.is_empty() {
            apply_overrides(&mut layers, &request.overrides, &self.config.security);
        }

        let mut exposition = synthesize(&layers, &self.config);
        enforce_budget(
            &mut exposition,
            context.max_total_tokens,
            context.safety_factor(),
        );

        Ok(ContextEnvelope {
            id,
            created_at: exposition.created_at,
            status: ContextEnvelope::status_for(&reports),
            token_budget_used: exposition.token_count,
            identity: layers.identity,
            intent: layers.intent,
            domain: layers.domain,
            rules: layers.rules,
            environment: layers.environment,
            exposition,
            processing_time_ms: 0,
            layers: reports,
        })
    }

    /// Run one adapter under its timeout and panic guard.
    /// `None` means the layer is disabled.
    async fn run_layer(
        &self,
        kind: LayerKind,
        request: &BuildRequest,
    ) -> (LayerKind, Option<Sourced<LayerValue>>) {
        if !self.config.context.layers.enabled(kind) {
            debug!(layer = %kind, "Layer disabled");
            return (kind, None);
        }

        let timeout_ms = self.config.context.sources.get(kind).timeout_ms;
        let guarded = tokio::time::timeout(
            Duration::from_millis(timeout_ms) + ADAPTER_GRACE,
            AssertUnwindSafe(self.adapter(kind, request)).catch_unwind(),
        )
        .await;

        let sourced = match guarded {
            Ok(Ok(sourced)) => sourced,
            Ok(Err(_)) => Sourced::degraded(LayerValue::default_for(kind), DegradeReason::Panicked),
            Err(_) => Sourced::degraded(
                LayerValue::default_for(kind),
                DegradeReason::TimedOut { timeout_ms },
            ),
        };
        (kind, Some(sourced))
    }

    fn adapter<'a>(
        &'a self,
        kind: LayerKind,
        request: &'a BuildRequest,
    ) -> BoxFuture<'a, Sourced<LayerValue>> {
        let sources = &self.config.context.sources;
        let body = &request.body;
        match kind {
            LayerKind::Identity => async move {
                let mut sourced = build_identity(
                    &request.claims,
                    self.collaborators.history.as_deref(),
                    &sources.identity,
                )
                .await;
                if let Some(signals) = &body.interaction {
                    sourced.value_mut().enrich(signals);
                }
                map_sourced(sourced, LayerValue::Identity)
            }
            .boxed(),
            LayerKind::Intent => async move {
                let intent = detect_intent(&body.message, body.task_type.as_deref());
                let intent = refine_with_history(intent, &body.session_history);
                Sourced::Fresh(LayerValue::Intent(intent))
            }
            .boxed(),
            LayerKind::Domain => async move {
                let input = DomainInput {
                    repository_path: body.repository_path.as_deref(),
                    project_id: body.project_id.as_deref(),
                    metadata: body.metadata.as_ref(),
                };
                let sourced = build_domain(
                    input,
                    self.collaborators.domain.as_deref(),
                    &self.config.security,
                    &sources.domain,
                )
                .await;
                map_sourced(sourced, LayerValue::Domain)
            }
            .boxed(),
            LayerKind::Rules => async move {
                Sourced::Fresh(LayerValue::Rules(build_rules(request.tenant_policies.as_ref())))
            }
            .boxed(),
            LayerKind::Environment => async move {
                let sourced = build_environment(
                    self.collaborators.settings.as_ref(),
                    self.collaborators.load.as_deref(),
                )
                .await;
                map_sourced(sourced, LayerValue::Environment)
            }
            .boxed(),
        }
    }

    fn sanitize(&self, message: &str) -> String {
        sanitize_message(message, &self.config.security)
    }

    fn sanitize_reason(&self, reason: &DegradeReason) -> DegradeReason {
        match reason {
            DegradeReason::SourceFailed { message } => DegradeReason::SourceFailed {
                message: self.sanitize(message),
            },
            DegradeReason::InvalidInput { message } => DegradeReason::InvalidInput {
                message: self.sanitize(message),
            },
            other => other.clone(),
        }
    }
}
