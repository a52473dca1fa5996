//! Task descriptor — what the caller wants routed.
//!
//! Produced by the caller and enriched by the router from the envelope
//! before any candidate is chosen.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Criticality {
    /// Scoring weight applied to candidate quality.
    pub fn weight(&self) -> f64 {
        match self {
            Criticality::Low => 0.5,
            Criticality::Normal => 1.0,
            Criticality::High => 1.5,
            Criticality::Critical => 2.0,
        }
    }
}

/// What the task needs from a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub code_generation: bool,
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub long_context: bool,
}

/// Soft preferences set by the context routing rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingHints {
    #[serde(default)]
    pub prefer_local: bool,
    #[serde(default)]
    pub prefer_lightweight: bool,
    #[serde(default)]
    pub allow_advanced: bool,
    #[serde(default)]
    pub compliance_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_type: String,

    #[serde(default)]
    pub criticality: Criticality,

    #[serde(default)]
    pub constraints: Map<String, Value>,

    /// Estimated context size in tokens.
    #[serde(default)]
    pub context_size: u64,

    /// Compliance regimes the chosen candidate must satisfy.
    #[serde(default)]
    pub compliance: Vec<String>,

    #[serde(default)]
    pub capabilities: Capabilities,

    #[serde(default)]
    pub hints: RoutingHints,
}

impl TaskDescriptor {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}
