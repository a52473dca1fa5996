//! Identity layer — who is asking.
//!
//! Built from authentication claims plus an optional history lookup.
//! The preference map is always complete: defaults, then role adjustments,
//! then claim- and request-supplied overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Coarse expertise tier inferred from roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseTier {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl ExpertiseTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertiseTier::Beginner => "beginner",
            ExpertiseTier::Intermediate => "intermediate",
            ExpertiseTier::Expert => "expert",
        }
    }

    /// One step up; `Expert` stays put.
    pub fn promoted(self) -> Self {
        match self {
            ExpertiseTier::Beginner => ExpertiseTier::Intermediate,
            ExpertiseTier::Intermediate | ExpertiseTier::Expert => ExpertiseTier::Expert,
        }
    }
}

impl fmt::Display for ExpertiseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub expertise: ExpertiseTier,

    /// Tone, detail level, format, and any claim-supplied extras.
    #[serde(default)]
    pub preferences: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_summary: Option<String>,

    #[serde(default)]
    pub session_count: u32,

    pub last_seen: DateTime<Utc>,
}

impl Default for IdentityLayer {
    fn default() -> Self {
        Self {
            user_id: None,
            tenant_id: None,
            roles: Vec::new(),
            expertise: ExpertiseTier::default(),
            preferences: Self::default_preferences(),
            history_summary: None,
            session_count: 0,
            last_seen: Utc::now(),
        }
    }
}

impl IdentityLayer {
    /// The static preference profile every identity starts from.
    pub fn default_preferences() -> Map<String, Value> {
        let mut prefs = Map::new();
        prefs.insert("tone".into(), Value::from("professional"));
        prefs.insert("detail_level".into(), Value::from("medium"));
        prefs.insert("format".into(), Value::from("markdown"));
        prefs.insert("include_examples".into(), Value::Bool(true));
        prefs.insert("language".into(), Value::from("english"));
        prefs
    }

    /// True when nothing identifies the caller.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none() && self.tenant_id.is_none() && self.roles.is_empty()
    }

    pub fn preference_str(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).and_then(Value::as_str)
    }

    /// Fold in signals observed during the current session.
    pub fn enrich(&mut self, signals: &InteractionSignals) {
        if signals.asked_for_code {
            self.preferences.insert("include_code".into(), Value::Bool(true));
        }
        if signals.preferred_brief {
            self.preferences.insert("detail_level".into(), Value::from("low"));
        }
        // Explicit requests for depth win over an earlier preference for brevity.
        if signals.asked_for_details {
            self.preferences.insert("detail_level".into(), Value::from("high"));
        }
        if signals.asked_advanced_questions {
            self.expertise = self.expertise.promoted();
        }
    }
}

/// Behavioral signals from the current interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionSignals {
    #[serde(default)]
    pub asked_for_code: bool,
    #[serde(default)]
    pub preferred_brief: bool,
    #[serde(default)]
    pub asked_for_details: bool,
    #[serde(default)]
    pub asked_advanced_questions: bool,
}
