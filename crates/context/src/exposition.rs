//! Exposition synthesizer — fuses the five layers into one payload.
//!
//! Sections appear in fixed layer order, each clipped to its layer's token
//! allowance. Disabled layers and layers with nothing to say are omitted.

use crate::layers::Layers;
use crate::token::{clip_to_tokens, estimate_exposition_tokens};
use chrono::Utc;
use serde_json::{Map, Value};
use strata_config::StrataConfig;
use strata_core::{
    DomainLayer, EnvironmentLayer, Exposition, IdentityLayer, IntentLayer, LayerKind, RulesLayer,
};

/// Intents that raise the priority score.
pub const HIGH_PRIORITY_INTENTS: &[&str] = &["architecture_design", "security_analysis"];

const BASE_PRIORITY: f64 = 0.5;
const INTENT_PRIORITY_BONUS: f64 = 0.3;
const LOAD_PRIORITY_BONUS: f64 = 0.2;

/// Build narrative, structured map, token estimate and priority score.
pub fn synthesize(layers: &Layers, config: &StrataConfig) -> Exposition {
    let layer_config = &config.context.layers;

    let mut sections = Vec::new();
    for kind in LayerKind::ALL {
        if !layer_config.enabled(kind) {
            continue;
        }
        let section = match kind {
            LayerKind::Identity => identity_section(&layers.identity),
            LayerKind::Intent => Some(intent_section(&layers.intent)),
            LayerKind::Domain => domain_section(&layers.domain),
            LayerKind::Rules => rules_section(&layers.rules),
            LayerKind::Environment => Some(environment_section(&layers.environment)),
        };
        if let Some(section) = section {
            let max_tokens = layer_config.get(kind).max_tokens;
            sections.push(clip_to_tokens(&section, max_tokens).to_string());
        }
    }
    let narrative = sections.join("\n\n");

    let structured = structured_fields(layers);
    let token_count = estimate_exposition_tokens(&narrative, &structured);

    let mut priority_score = BASE_PRIORITY;
    if layers.intent.is_any(HIGH_PRIORITY_INTENTS) {
        priority_score += INTENT_PRIORITY_BONUS;
    }
    if layers
        .environment
        .load_above(config.routing.high_load_threshold)
    {
        priority_score += LOAD_PRIORITY_BONUS;
    }

    Exposition {
        narrative,
        structured,
        token_count,
        priority_score: priority_score.min(1.0),
        created_at: Utc::now(),
    }
}

// ── Sections ──────────────────────────────────────────────────────────────

fn identity_section(identity: &IdentityLayer) -> Option<String> {
    let user_id = identity.user_id.as_deref()?;
    let mut out = format!(
        "User:\n- ID: {}, Tenant: {}, Roles: {}\n- Expertise: {}\n- Preferences: {}",
        user_id,
        identity.tenant_id.as_deref().unwrap_or("none"),
        list(&identity.roles),
        identity.expertise,
        Value::Object(identity.preferences.clone()),
    );
    if let Some(history) = &identity.history_summary {
        out.push_str(&format!("\n- History: {history}"));
    }
    Some(out)
}

fn intent_section(intent: &IntentLayer) -> String {
    format!(
        "Intent:\n- Primary: {}\n- Task: {}\n- Success: {}\n- Constraints: {}",
        intent.primary_intent,
        intent.task_type.as_deref().unwrap_or("Not specified"),
        intent.success_criteria,
        Value::Object(intent.constraints.clone()),
    )
}

fn domain_section(domain: &DomainLayer) -> Option<String> {
    if domain.is_empty() {
        return None;
    }
    let components: Vec<String> = domain
        .components
        .iter()
        .map(|(name, description)| format!("{name}: {description}"))
        .collect();
    let docs: Vec<String> = domain.related_docs.keys().cloned().collect();
    Some(format!(
        "Domain:\n- Repo: {}\n- Summary: {}\n- Components: {}\n- Docs: [{}]",
        domain.repo_path.as_deref().unwrap_or("none"),
        domain.summary.as_deref().unwrap_or("No analysis"),
        list(&components),
        docs.join(", "),
    ))
}

fn rules_section(rules: &RulesLayer) -> Option<String> {
    if rules.is_empty() {
        return None;
    }
    Some(format!(
        "Rules:\n- Soft walls (style): {}\n- Hard walls (mandatory): {}",
        Value::Object(rules.soft_walls.clone()),
        Value::Object(rules.hard_walls.clone()),
    ))
}

fn environment_section(env: &EnvironmentLayer) -> String {
    let enabled: Vec<String> = env
        .feature_flags
        .iter()
        .filter(|(_, on)| **on)
        .map(|(name, _)| name.clone())
        .collect();
    let load = env
        .system_load
        .map(|l| format!("{l:.2}"))
        .unwrap_or_else(|| "unknown".into());
    format!(
        "Environment:\n- Mode: {}\n- Routing: {}\n- Features: {}\n- Load: {}",
        env.tier,
        env.routing_mode,
        list(&enabled),
        load,
    )
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join(", ")
    }
}

// ── Structured payload ───────────────────────────────────────────────────

fn structured_fields(layers: &Layers) -> Map<String, Value> {
    let mut map = Map::new();
    let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

    map.insert("user_id".into(), opt(&layers.identity.user_id));
    map.insert("tenant_id".into(), opt(&layers.identity.tenant_id));
    map.insert(
        "roles".into(),
        Value::Array(
            layers
                .identity
                .roles
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ),
    );
    map.insert(
        "primary_intent".into(),
        Value::String(layers.intent.primary_intent.clone()),
    );
    map.insert("task_type".into(), opt(&layers.intent.task_type));
    map.insert("repo_path".into(), opt(&layers.domain.repo_path));
    map.insert(
        "environment".into(),
        Value::String(layers.environment.tier.as_str().into()),
    );
    map.insert(
        "model_routing".into(),
        Value::String(layers.environment.routing_mode.clone()),
    );
    map.insert(
        "hard_walls".into(),
        Value::Object(layers.rules.hard_walls.clone()),
    );
    map.insert(
        "feature_flags".into(),
        Value::Object(
            layers
                .environment
                .feature_flags
                .iter()
                .map(|(k, v)| (k.clone(), Value::Bool(*v)))
                .collect(),
        ),
    );
    map.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
    map
}
