//! Rules layer — the two-wall system.
//!
//! Soft walls are advisory and only ever produce log lines. Hard walls are
//! mandatory: the router filters candidates against them and clamps
//! invocation parameters to their ceilings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesLayer {
    #[serde(default)]
    pub soft_walls: Map<String, Value>,

    #[serde(default)]
    pub hard_walls: Map<String, Value>,

    /// Tenant policy payload as received, for audit.
    #[serde(default)]
    pub tenant_policies: Map<String, Value>,

    #[serde(default)]
    pub validation_schemas: Map<String, Value>,
}

/// Observed facts about an action or response, checked against hard walls.
#[derive(Debug, Clone, Default)]
pub struct RuleProbe {
    pub action: Option<String>,
    pub response_time_seconds: Option<f64>,
    pub token_count: Option<u64>,
    pub response_text: Option<String>,
    pub has_next_steps: bool,
}

/// A compliance check implied by the hard walls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub kind: String,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub description: String,
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

impl RulesLayer {
    pub fn is_empty(&self) -> bool {
        self.soft_walls.is_empty() && self.hard_walls.is_empty()
    }

    /// Providers a candidate must belong to. Empty means unrestricted.
    pub fn allowed_model_providers(&self) -> Vec<String> {
        string_list(self.hard_walls.get("allowed_model_providers"))
    }

    pub fn forbidden_actions(&self) -> Vec<String> {
        string_list(self.hard_walls.get("forbidden_actions"))
    }

    pub fn approval_required(&self) -> Vec<String> {
        string_list(self.hard_walls.get("require_human_approval_for"))
    }

    /// Compliance requirements, from `compliance_level` (string or list).
    pub fn compliance_level(&self) -> Vec<String> {
        string_list(self.hard_walls.get("compliance_level"))
    }

    pub fn require_compliance(&self) -> bool {
        self.hard_walls
            .get("require_compliance")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn max_tokens_per_response(&self) -> Option<u64> {
        self.hard_walls.get("max_tokens_per_response").and_then(Value::as_u64)
    }

    pub fn max_response_time_seconds(&self) -> Option<f64> {
        self.hard_walls.get("max_response_time_seconds").and_then(Value::as_f64)
    }

    /// Inclusive `[low, high]` temperature bounds.
    pub fn temperature_range(&self) -> Option<(f64, f64)> {
        let range = self.hard_walls.get("temperature_range")?.as_array()?;
        match range.as_slice() {
            [low, high] => Some((low.as_f64()?, high.as_f64()?)),
            _ => None,
        }
    }

    /// Hard-wall violations for `probe`. Soft-wall advisories are logged only.
    pub fn check(&self, probe: &RuleProbe) -> Vec<String> {
        let mut violations = Vec::new();

        if let Some(action) = &probe.action
            && self.forbidden_actions().iter().any(|a| a == action)
        {
            violations.push(format!("Forbidden action detected: {action}"));
        }

        if let (Some(elapsed), Some(limit)) =
            (probe.response_time_seconds, self.max_response_time_seconds())
            && elapsed > limit
        {
            violations.push(format!("Response time exceeds limit: {elapsed} > {limit}"));
        }

        if let (Some(tokens), Some(limit)) = (probe.token_count, self.max_tokens_per_response())
            && tokens > limit
        {
            violations.push(format!("Token count exceeds limit: {tokens} > {limit}"));
        }

        let advisories = self.soft_advisories(probe);
        if !advisories.is_empty() {
            info!(advisories = ?advisories, "Soft wall advisories");
        }

        violations
    }

    fn soft_advisories(&self, probe: &RuleProbe) -> Vec<&'static str> {
        let enabled = |key: &str| self.soft_walls.get(key).and_then(Value::as_bool).unwrap_or(false);
        let mut advisories = Vec::new();

        if enabled("include_next_steps") && !probe.has_next_steps {
            advisories.push("Consider including next steps");
        }
        if enabled("prefer_actionable_insights")
            && let Some(text) = &probe.response_text
            && !text.to_lowercase().contains("actionable")
        {
            advisories.push("Response should include actionable insights");
        }
        advisories
    }

    pub fn compliance_checks(&self) -> Vec<ComplianceCheck> {
        let mut checks = Vec::new();
        let flag = |key: &str| self.hard_walls.get(key).and_then(Value::as_bool).unwrap_or(false);

        if flag("security_scan_required") {
            checks.push(ComplianceCheck {
                kind: "security_scan".into(),
                severity: "high".into(),
                action: None,
                description: "Scan for security vulnerabilities".into(),
            });
        }
        if self.hard_walls.contains_key("pii_handling") {
            checks.push(ComplianceCheck {
                kind: "pii_detection".into(),
                severity: "high".into(),
                action: None,
                description: "Detect and redact PII data".into(),
            });
        }
        if flag("schema_validation") {
            checks.push(ComplianceCheck {
                kind: "schema_validation".into(),
                severity: "medium".into(),
                action: None,
                description: "Validate against defined schemas".into(),
            });
        }
        for action in self.approval_required() {
            checks.push(ComplianceCheck {
                kind: "approval_required".into(),
                severity: "high".into(),
                description: format!("Human approval required for {action}"),
                action: Some(action),
            });
        }
        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(hard: Value) -> RulesLayer {
        RulesLayer {
            hard_walls: hard.as_object().cloned().unwrap(),
            ..RulesLayer::default()
        }
    }

    #[test]
    fn accessors_read_typed_values() {
        let rules = layer(json!({
            "allowed_model_providers": ["anthropic"],
            "max_tokens_per_response": 4000,
            "temperature_range": [0.0, 1.0],
            "compliance_level": "SOC2",
            "require_compliance": true
        }));
        assert_eq!(rules.allowed_model_providers(), vec!["anthropic"]);
        assert_eq!(rules.max_tokens_per_response(), Some(4000));
        assert_eq!(rules.temperature_range(), Some((0.0, 1.0)));
        assert_eq!(rules.compliance_level(), vec!["SOC2"]);
        assert!(rules.require_compliance());
    }

    #[test]
    fn malformed_range_is_ignored() {
        let rules = layer(json!({"temperature_range": [0.2]}));
        assert_eq!(rules.temperature_range(), None);
    }

    #[test]
    fn check_reports_hard_violations() {
        let rules = layer(json!({
            "forbidden_actions": ["execute_live_code"],
            "max_tokens_per_response": 100,
            "max_response_time_seconds": 30
        }));
        let probe = RuleProbe {
            action: Some("execute_live_code".into()),
            token_count: Some(500),
            response_time_seconds: Some(10.0),
            ..RuleProbe::default()
        };
        let violations = rules.check(&probe);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("execute_live_code"));
        assert!(violations[1].contains("500 > 100"));
    }

    #[test]
    fn compliance_checks_expand_approvals() {
        let rules = layer(json!({
            "security_scan_required": true,
            "pii_handling": "mask",
            "require_human_approval_for": ["production_changes", "destructive_operations"]
        }));
        let checks = rules.compliance_checks();
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[2].action.as_deref(), Some("production_changes"));
    }
}
