//! Identity source — claims, role heuristics, and time-boxed history.

use serde_json::{Map, Value};
use std::time::Duration;
use strata_config::SourceSettings;
use strata_core::merge::deep_merge;
use strata_core::{
    DegradeReason, ExpertiseTier, HistoryLookup, HistoryRecord, IdentityLayer, SourceError,
    Sourced,
};
use tokio::time::Instant;
use tracing::{debug, warn};

const TECHNICAL_ROLES: &[&str] = &["admin", "developer"];
const EXECUTIVE_ROLES: &[&str] = &["executive", "manager"];
const EXPERT_KEYWORDS: &[&str] = &["senior", "lead"];
const BEGINNER_KEYWORDS: &[&str] = &["junior", "intern"];

/// Build the identity layer from raw claims and an optional history store.
///
/// A history failure or timeout degrades the layer but keeps everything
/// derived from the claims.
pub async fn build_identity(
    claims: &Map<String, Value>,
    history: Option<&dyn HistoryLookup>,
    settings: &SourceSettings,
) -> Sourced<IdentityLayer> {
    let mut identity = identity_from_claims(claims);

    let (Some(history), Some(user_id)) = (history, identity.user_id.clone()) else {
        return Sourced::Fresh(identity);
    };

    match lookup_with_deadline(history, &user_id, settings).await {
        Ok(Some(record)) => {
            apply_history(&mut identity, record);
            Sourced::Fresh(identity)
        }
        Ok(None) => Sourced::Fresh(identity),
        Err(e) => {
            warn!(layer = "identity", "History lookup failed, using claims only");
            let reason = match e {
                SourceError::Timeout { timeout_ms } => DegradeReason::TimedOut { timeout_ms },
                other => DegradeReason::SourceFailed {
                    message: other.to_string(),
                },
            };
            Sourced::degraded(identity, reason)
        }
    }
}

/// Claims-only identity: ids, roles, expertise, and the full preference map.
pub fn identity_from_claims(claims: &Map<String, Value>) -> IdentityLayer {
    let user_id = first_string(claims, &["sub", "user_id"]);
    let tenant_id = first_string(claims, &["tenant_id", "organization_id"]);
    let roles = roles_from_claims(claims);

    let mut preferences = IdentityLayer::default_preferences();
    apply_role_preferences(&mut preferences, &roles);
    if let Some(Value::Object(overrides)) = claims.get("preferences") {
        deep_merge(&mut preferences, overrides);
    }

    IdentityLayer {
        user_id,
        tenant_id,
        expertise: infer_expertise(&roles),
        roles,
        preferences,
        ..IdentityLayer::default()
    }
}

fn first_string(claims: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| claims.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn roles_from_claims(claims: &Map<String, Value>) -> Vec<String> {
    let raw = claims.get("roles").or_else(|| claims.get("groups"));
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn has_role(roles: &[String], wanted: &[&str]) -> bool {
    roles
        .iter()
        .any(|r| wanted.iter().any(|w| r.eq_ignore_ascii_case(w)))
}

/// A role matches a keyword if any of its `_`/`-`/space separated words does.
fn has_keyword(roles: &[String], keywords: &[&str]) -> bool {
    roles.iter().any(|role| {
        role.to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| keywords.contains(&word))
    })
}

fn apply_role_preferences(preferences: &mut Map<String, Value>, roles: &[String]) {
    if has_role(roles, TECHNICAL_ROLES) {
        preferences.insert("tone".into(), Value::from("technical"));
        preferences.insert("detail_level".into(), Value::from("high"));
        preferences.insert("include_code".into(), Value::Bool(true));
    } else if has_role(roles, EXECUTIVE_ROLES) {
        preferences.insert("tone".into(), Value::from("executive"));
        preferences.insert("detail_level".into(), Value::from("summary"));
        preferences.insert("include_metrics".into(), Value::Bool(true));
    }
}

pub fn infer_expertise(roles: &[String]) -> ExpertiseTier {
    if has_keyword(roles, EXPERT_KEYWORDS) {
        ExpertiseTier::Expert
    } else if has_keyword(roles, BEGINNER_KEYWORDS) {
        ExpertiseTier::Beginner
    } else {
        ExpertiseTier::Intermediate
    }
}

fn apply_history(identity: &mut IdentityLayer, record: HistoryRecord) {
    identity.history_summary = record.summary;
    identity.session_count = record.session_count;
    if let Some(last_seen) = record.last_seen {
        identity.last_seen = last_seen;
    }
}

/// Retry the lookup inside one overall deadline of `settings.timeout_ms`.
async fn lookup_with_deadline(
    history: &dyn HistoryLookup,
    user_id: &str,
    settings: &SourceSettings,
) -> Result<Option<HistoryRecord>, SourceError> {
    let deadline = Instant::now() + Duration::from_millis(settings.timeout_ms);
    let attempts = settings.retry_attempts + 1;
    let mut last_error = SourceError::Timeout {
        timeout_ms: settings.timeout_ms,
    };

    for attempt in 1..=attempts {
        match tokio::time::timeout_at(deadline, history.lookup(user_id)).await {
            Ok(Ok(record)) => return Ok(record),
            Ok(Err(e)) => {
                debug!(attempt, error = %e, "History lookup attempt failed");
                last_error = e;
            }
            Err(_) => {
                return Err(SourceError::Timeout {
                    timeout_ms: settings.timeout_ms,
                });
            }
        }
    }

    Err(last_error)
}
