//! Per-invocation parameter adjustment.

use serde::{Deserialize, Serialize};
use strata_config::RoutingConfig;
use strata_core::{ContextEnvelope, ExpertiseTier};

/// Intents that get the long-form response ceiling.
pub const LONG_FORM_INTENTS: &[&str] = &["architecture_design", "implementation"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvocationParams {
    pub temperature: f64,
    pub max_tokens: u64,
}

impl InvocationParams {
    pub fn defaults(config: &RoutingConfig) -> Self {
        Self {
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
        }
    }
}

/// Adjust `params` for the envelope, returning the rationale for each change.
///
/// Order: expertise narrows or widens temperature, long-form intents raise
/// `max_tokens`, then hard walls clamp both.
pub fn adjust_parameters(
    params: &mut InvocationParams,
    envelope: &ContextEnvelope,
    config: &RoutingConfig,
) -> Vec<String> {
    let mut rationale = Vec::new();

    match envelope.identity.expertise {
        ExpertiseTier::Beginner if params.temperature > config.beginner_temperature_ceiling => {
            params.temperature = config.beginner_temperature_ceiling;
            rationale.push(format!("temperature narrowed to {} for beginner", params.temperature));
        }
        ExpertiseTier::Expert if params.temperature < config.expert_temperature_floor => {
            params.temperature = config.expert_temperature_floor;
            rationale.push(format!("temperature widened to {} for expert", params.temperature));
        }
        _ => {}
    }

    if envelope.intent.is_any(LONG_FORM_INTENTS) && params.max_tokens < config.long_form_max_tokens
    {
        params.max_tokens = config.long_form_max_tokens;
        rationale.push(format!(
            "max_tokens raised to {} for {}",
            params.max_tokens, envelope.intent.primary_intent
        ));
    }

    if let Some(ceiling) = envelope.rules.max_tokens_per_response()
        && params.max_tokens > ceiling
    {
        params.max_tokens = ceiling;
        rationale.push(format!("max_tokens clamped to hard wall {ceiling}"));
    }

    if let Some((low, high)) = envelope.rules.temperature_range() {
        let clamped = params.temperature.clamp(low.min(high), high.max(low));
        if clamped != params.temperature {
            params.temperature = clamped;
            rationale.push(format!("temperature clamped to hard wall [{low}, {high}]"));
        }
    }

    rationale
}
