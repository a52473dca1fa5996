//! Exposition — the fused narrative and structured payload of an envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker appended to a narrative cut by the token budget.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposition {
    /// Labeled sections in layer order, separated by blank lines.
    pub narrative: String,

    /// Fields most useful to downstream consumers (ids, intent, walls, flags).
    pub structured: Map<String, Value>,

    /// Approximate tokens: characters / 4, not a real tokenizer.
    pub token_count: u64,

    pub priority_score: f64,

    pub created_at: DateTime<Utc>,
}

impl Default for Exposition {
    fn default() -> Self {
        Self {
            narrative: String::new(),
            structured: Map::new(),
            token_count: 0,
            priority_score: 0.5,
            created_at: Utc::now(),
        }
    }
}

impl Exposition {
    pub fn is_truncated(&self) -> bool {
        self.narrative.ends_with(TRUNCATION_MARKER)
    }
}
