//! Environment layer — deployment tier, routing mode, flags, and load.

use crate::identity::IdentityLayer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentTier {
    #[default]
    Development,
    Staging,
    Production,
}

impl EnvironmentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentTier::Development => "development",
            EnvironmentTier::Staging => "staging",
            EnvironmentTier::Production => "production",
        }
    }
}

impl fmt::Display for EnvironmentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(EnvironmentTier::Development),
            "staging" | "stage" => Ok(EnvironmentTier::Staging),
            "production" | "prod" => Ok(EnvironmentTier::Production),
            other => Err(format!("unknown environment tier '{other}'")),
        }
    }
}

/// Routing mode used when none is configured.
pub const DEFAULT_ROUTING_MODE: &str = "local-preferred";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentLayer {
    #[serde(default)]
    pub tier: EnvironmentTier,

    #[serde(default = "default_routing_mode")]
    pub routing_mode: String,

    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,

    #[serde(default)]
    pub rate_limits: BTreeMap<String, u64>,

    #[serde(default)]
    pub active_sessions: u32,

    /// max(cpu, memory) utilization in [0, 1], when telemetry is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_load: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_version: Option<String>,
}

fn default_routing_mode() -> String {
    DEFAULT_ROUTING_MODE.into()
}

impl Default for EnvironmentLayer {
    fn default() -> Self {
        Self {
            tier: EnvironmentTier::default(),
            routing_mode: default_routing_mode(),
            feature_flags: BTreeMap::new(),
            rate_limits: BTreeMap::new(),
            active_sessions: 0,
            system_load: None,
            deployment_version: None,
        }
    }
}

/// Inputs for [`EnvironmentLayer::feature_enabled`].
#[derive(Debug, Clone, Default)]
pub struct FeatureGate {
    /// User ids allowed to see `beta_*` features.
    pub beta_users: Vec<String>,
    pub load_shedding_threshold: f64,
}

const PRODUCTION_RESTRICTED_FEATURES: &[&str] = &["debug_mode", "experimental_models"];
const NON_ESSENTIAL_FEATURES: &[&str] = &["advanced_analytics", "auto_scaling"];

/// Per-tier operational ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalConstraints {
    pub max_response_time_ms: u64,
    pub max_concurrent_requests: u32,
    pub enable_caching: bool,
    pub log_level: String,
}

impl EnvironmentLayer {
    pub fn is_production(&self) -> bool {
        self.tier == EnvironmentTier::Production
    }

    pub fn flag(&self, name: &str) -> bool {
        self.feature_flags.get(name).copied().unwrap_or(false)
    }

    /// True when the load sample exceeds `threshold`.
    pub fn load_above(&self, threshold: f64) -> bool {
        self.system_load.is_some_and(|load| load > threshold)
    }

    /// Whether `feature` is on for this request.
    pub fn feature_enabled(
        &self,
        feature: &str,
        user: Option<&IdentityLayer>,
        gate: &FeatureGate,
    ) -> bool {
        if !self.flag(feature) {
            return false;
        }
        if self.is_production() && PRODUCTION_RESTRICTED_FEATURES.contains(&feature) {
            return false;
        }
        if feature.starts_with("beta_")
            && let Some(user) = user
        {
            let listed = user
                .user_id
                .as_ref()
                .is_some_and(|id| gate.beta_users.iter().any(|b| b == id));
            if !listed {
                return false;
            }
        }
        if self.load_above(gate.load_shedding_threshold) && NON_ESSENTIAL_FEATURES.contains(&feature)
        {
            return false;
        }
        true
    }

    /// Ceilings for this tier, halved when load exceeds `high_load_threshold`.
    pub fn operational_constraints(&self, high_load_threshold: f64) -> OperationalConstraints {
        let mut constraints = match self.tier {
            EnvironmentTier::Production => OperationalConstraints {
                max_response_time_ms: 10_000,
                max_concurrent_requests: 50,
                enable_caching: true,
                log_level: "WARNING".into(),
            },
            EnvironmentTier::Development => OperationalConstraints {
                max_response_time_ms: 60_000,
                max_concurrent_requests: 5,
                enable_caching: false,
                log_level: "DEBUG".into(),
            },
            EnvironmentTier::Staging => OperationalConstraints {
                max_response_time_ms: 30_000,
                max_concurrent_requests: 10,
                enable_caching: true,
                log_level: "INFO".into(),
            },
        };

        if self.load_above(high_load_threshold) {
            constraints.max_response_time_ms /= 2;
            constraints.max_concurrent_requests = (constraints.max_concurrent_requests / 2).max(1);
        }
        constraints
    }
}
