//! Intent layer — what job the caller is hiring the system to do.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Intent category used when classification finds nothing.
pub const GENERAL_ASSISTANCE: &str = "general_assistance";

/// Intent category forced onto fallback envelopes.
pub const ERROR_RECOVERY: &str = "error_recovery";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentLayer {
    /// Taxonomy category, or the normalized task-type hint.
    pub primary_intent: String,

    /// The explicit task-type hint as supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,

    /// Classification confidence in [0, 1].
    pub confidence: f64,

    pub success_criteria: String,

    #[serde(default)]
    pub constraints: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_target: Option<String>,
}

impl Default for IntentLayer {
    fn default() -> Self {
        Self {
            primary_intent: GENERAL_ASSISTANCE.into(),
            task_type: None,
            confidence: 0.0,
            success_criteria: String::new(),
            constraints: Map::new(),
            escalation_target: None,
        }
    }
}

impl IntentLayer {
    pub fn is(&self, category: &str) -> bool {
        self.primary_intent == category
    }

    pub fn is_any(&self, categories: &[&str]) -> bool {
        categories.iter().any(|c| self.is(c))
    }
}
