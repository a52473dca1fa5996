//! Request-scoped layer overrides.
//!
//! Each layer has its own typed override with its own merge policy; unknown
//! keys in a payload are dropped at deserialization.

use crate::environment::EnvironmentTier;
use crate::identity::ExpertiseTier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextOverride {
    #[serde(default)]
    pub identity: Option<IdentityOverride>,
    #[serde(default)]
    pub intent: Option<IntentOverride>,
    #[serde(default)]
    pub domain: Option<DomainOverride>,
    #[serde(default)]
    pub rules: Option<RulesOverride>,
    #[serde(default)]
    pub environment: Option<EnvironmentOverride>,
}

impl ContextOverride {
    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.intent.is_none()
            && self.domain.is_none()
            && self.rules.is_none()
            && self.environment.is_none()
    }
}

/// Preferences are deep-merged; expertise replaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityOverride {
    #[serde(default)]
    pub preferences: Option<Map<String, Value>>,
    #[serde(default)]
    pub expertise: Option<ExpertiseTier>,
}

/// Field-by-field replace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentOverride {
    #[serde(default)]
    pub primary_intent: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub constraints: Option<Map<String, Value>>,
    #[serde(default)]
    pub escalation_target: Option<String>,
}

/// Targeted update: `repo_path` replaces (after confinement), `key_components` merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainOverride {
    #[serde(default)]
    pub repo_path: Option<String>,
    #[serde(default)]
    pub key_components: Option<BTreeMap<String, String>>,
}

/// Key-level update into each wall map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesOverride {
    #[serde(default)]
    pub soft_walls: Option<Map<String, Value>>,
    #[serde(default)]
    pub hard_walls: Option<Map<String, Value>>,
}

/// Field replace for any field present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentOverride {
    #[serde(default)]
    pub tier: Option<EnvironmentTier>,
    #[serde(default)]
    pub routing_mode: Option<String>,
    #[serde(default)]
    pub feature_flags: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    pub rate_limits: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    pub active_sessions: Option<u32>,
    #[serde(default)]
    pub system_load: Option<f64>,
    #[serde(default)]
    pub deployment_version: Option<String>,
}
