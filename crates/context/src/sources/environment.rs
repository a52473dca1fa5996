//! Environment source — deployment settings and runtime load.

use std::collections::BTreeMap;
use strata_core::environment::DEFAULT_ROUTING_MODE;
use strata_core::{
    DegradeReason, EnvironmentLayer, EnvironmentTier, LoadProbe, SettingsSource, Sourced,
};
use tracing::warn;

/// (flag, setting key, default)
const FEATURE_FLAGS: &[(&str, &str, bool)] = &[
    ("semantic_cache", "FEATURE_SEMANTIC_CACHE", true),
    ("context_engineering_v2", "FEATURE_CONTEXT_ENGINEERING_V2", true),
    ("audit_logging", "FEATURE_AUDIT_LOGGING", true),
    ("multi_tenancy", "FEATURE_MULTI_TENANCY", false),
    ("rate_limiting", "FEATURE_RATE_LIMITING", true),
    ("advanced_analytics", "FEATURE_ADVANCED_ANALYTICS", false),
    ("auto_scaling", "FEATURE_AUTO_SCALING", false),
    ("budget_conscious", "FEATURE_BUDGET_CONSCIOUS", false),
    ("debug_mode", "DEBUG", false),
];

/// (limit, setting key, default)
const RATE_LIMITS: &[(&str, &str, u64)] = &[
    ("chat_per_minute", "RATE_LIMIT_CHAT_PER_MINUTE", 10),
    ("analytics_per_minute", "RATE_LIMIT_ANALYTICS_PER_MINUTE", 5),
    ("repo_analysis_per_hour", "RATE_LIMIT_REPO_ANALYSIS_PER_HOUR", 20),
    ("max_concurrent_sessions", "MAX_CONCURRENT_SESSIONS", 100),
];

pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// Read tier, routing mode, flags and limits from `settings`; load from `probe`.
///
/// An unrecognized tier or a malformed limit degrades the layer; the
/// offending value falls back to its default.
pub async fn build_environment(
    settings: &dyn SettingsSource,
    probe: Option<&dyn LoadProbe>,
) -> Sourced<EnvironmentLayer> {
    let mut problems = Vec::new();

    let tier = match settings.get("ENV").or_else(|| settings.get("ENVIRONMENT")) {
        Some(raw) => raw.parse::<EnvironmentTier>().unwrap_or_else(|e| {
            problems.push(e);
            EnvironmentTier::default()
        }),
        None => EnvironmentTier::default(),
    };

    let feature_flags: BTreeMap<String, bool> = FEATURE_FLAGS
        .iter()
        .map(|(flag, key, default)| {
            let enabled = settings.get(key).map(|v| parse_bool(&v)).unwrap_or(*default);
            (flag.to_string(), enabled)
        })
        .collect();

    let mut rate_limits = BTreeMap::new();
    for (limit, key, default) in RATE_LIMITS {
        let value = match settings.get(key) {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                problems.push(format!("{key} is not an integer"));
                *default
            }),
            None => *default,
        };
        rate_limits.insert(limit.to_string(), value);
    }

    let (active_sessions, sample) = match probe {
        Some(probe) => (probe.active_sessions().await, probe.sample().await),
        None => (None, None),
    };

    let layer = EnvironmentLayer {
        tier,
        routing_mode: settings
            .get("MODEL_ROUTING_MODE")
            .unwrap_or_else(|| DEFAULT_ROUTING_MODE.into()),
        feature_flags,
        rate_limits,
        active_sessions: active_sessions.unwrap_or(0),
        system_load: sample.map(|s| s.system_load()),
        deployment_version: Some(
            settings
                .get("DEPLOYMENT_VERSION")
                .unwrap_or_else(|| "unknown".into()),
        ),
    };

    if problems.is_empty() {
        Sourced::Fresh(layer)
    } else {
        warn!(layer = "environment", problems = ?problems, "Environment settings partially invalid");
        Sourced::degraded(
            layer,
            DegradeReason::InvalidInput {
                message: problems.join("; "),
            },
        )
    }
}
