//! Rules source — static wall baselines plus tenant policy overrides.
//!
//! Tenant overrides replace whole keys; nested maps are not merged.

use serde_json::{Map, Value, json};
use strata_core::RulesLayer;
use strata_core::merge::shallow_merge;

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn baseline_soft_walls() -> Map<String, Value> {
    object(json!({
        "brand_voice": "sharp, practical, operator-focused",
        "style": "short paragraphs, clear bullets, no fluff",
        "tone": "professional but approachable",
        "include_next_steps": true,
        "prefer_actionable_insights": true,
        "use_concrete_examples": true,
        "avoid_jargon_unless_necessary": true,
        "default_format": "markdown",
        "include_code_blocks": true,
        "consider_security_first": true,
        "think_about_scalability": true,
        "include_monitoring_suggestions": true,
        "document_assumptions": true
    }))
}

pub fn baseline_hard_walls() -> Map<String, Value> {
    object(json!({
        "forbidden_actions": [
            "execute_live_code",
            "change_prod_config_without_approval",
            "access_sensitive_data_without_authorization",
            "bypass_security_controls"
        ],
        "pii_handling": "never log secrets, redact access tokens, mask personal data",
        "security_scan_required": true,
        "schema_validation": true,
        "input_sanitization": true,
        "output_validation": true,
        "max_response_time_seconds": 30,
        "max_tokens_per_response": 4000,
        "require_human_approval_for": [
            "destructive_operations",
            "production_changes",
            "security_policy_changes"
        ],
        "encrypt_sensitive_data": true,
        "audit_log_access": true,
        "retention_policy_days": 90,
        "allowed_model_providers": ["anthropic", "openai", "ollama"],
        "forbidden_model_types": ["unvalidated_models"],
        "temperature_range": [0.0, 1.0]
    }))
}

pub fn baseline_validation_schemas() -> Map<String, Value> {
    object(json!({
        "user_input": {
            "type": "object",
            "required": ["message"],
            "properties": {
                "message": {"type": "string", "max_length": 10000},
                "task_type": {"type": "string"},
                "session_id": {"type": "string"}
            }
        },
        "agent_response": {
            "type": "object",
            "required": ["response"],
            "properties": {
                "response": {"type": "string", "max_length": 50000},
                "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                "requires_approval": {"type": "boolean"}
            }
        }
    }))
}

/// Baselines with `tenant_policies.{soft_walls,hard_walls,validation_schemas}`
/// shallow-merged in. The raw tenant payload is kept for audit.
pub fn build_rules(tenant_policies: Option<&Map<String, Value>>) -> RulesLayer {
    let mut layer = RulesLayer {
        soft_walls: baseline_soft_walls(),
        hard_walls: baseline_hard_walls(),
        tenant_policies: Map::new(),
        validation_schemas: baseline_validation_schemas(),
    };

    let Some(policies) = tenant_policies else {
        return layer;
    };

    let section = |name: &str| match policies.get(name) {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };
    if let Some(soft) = section("soft_walls") {
        shallow_merge(&mut layer.soft_walls, soft);
    }
    if let Some(hard) = section("hard_walls") {
        shallow_merge(&mut layer.hard_walls, hard);
    }
    if let Some(schemas) = section("validation_schemas") {
        shallow_merge(&mut layer.validation_schemas, schemas);
    }
    layer.tenant_policies = policies.clone();

    layer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_without_tenant() {
        let rules = build_rules(None);
        assert_eq!(rules.allowed_model_providers(), vec!["anthropic", "openai", "ollama"]);
        assert_eq!(rules.max_tokens_per_response(), Some(4000));
        assert_eq!(rules.temperature_range(), Some((0.0, 1.0)));
        assert!(rules.tenant_policies.is_empty());
        assert_eq!(rules.soft_walls["include_next_steps"], Value::Bool(true));
    }

    #[test]
    fn tenant_override_replaces_whole_keys() {
        let tenant = object(json!({
            "hard_walls": {
                "allowed_model_providers": ["anthropic"],
                "forbidden_actions": ["delete_repo"]
            },
            "soft_walls": {"tone": "terse"}
        }));
        let rules = build_rules(Some(&tenant));
        assert_eq!(rules.allowed_model_providers(), vec!["anthropic"]);
        // Replaced, not appended.
        assert_eq!(rules.forbidden_actions(), vec!["delete_repo"]);
        assert_eq!(rules.soft_walls["tone"], "terse");
        assert_eq!(rules.max_tokens_per_response(), Some(4000));
        assert_eq!(rules.tenant_policies, tenant);
    }

    #[test]
    fn nested_schema_override_is_not_deep_merged() {
        let tenant = object(json!({
            "validation_schemas": {"user_input": {"type": "object"}}
        }));
        let rules = build_rules(Some(&tenant));
        assert!(rules.validation_schemas["user_input"].get("required").is_none());
        assert!(rules.validation_schemas.contains_key("agent_response"));
    }
}
