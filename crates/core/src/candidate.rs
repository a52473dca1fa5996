//! Candidates — downstream provider/model choices — and the seams the
//! router delegates to: a registry and a base policy engine.
//!
//! Both seams are read-only and may be shared across concurrent requests.

use crate::task::TaskDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// `provider/model`, unique within a registry.
    pub id: String,
    pub provider: String,
    pub model: String,

    /// Relative quality in [0, 1].
    #[serde(default = "default_quality")]
    pub quality: f64,

    /// Cost per thousand tokens, in arbitrary units.
    #[serde(default)]
    pub cost_per_1k: f64,

    #[serde(default = "default_context_window")]
    pub context_window: u64,

    /// Runs on local/offline infrastructure.
    #[serde(default)]
    pub local: bool,

    #[serde(default)]
    pub lightweight: bool,

    /// Suitable for advanced/expert workloads.
    #[serde(default)]
    pub advanced: bool,

    /// Strong at writing and editing code.
    #[serde(default)]
    pub code_generation: bool,

    /// Strong at multi-step reasoning and design.
    #[serde(default)]
    pub reasoning: bool,

    #[serde(default)]
    pub compliance_approved: bool,

    #[serde(default)]
    pub production_ready: bool,
}

fn default_quality() -> f64 {
    0.5
}

fn default_context_window() -> u64 {
    8192
}

impl Candidate {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        let provider = provider.into();
        let model = model.into();
        Self {
            id: format!("{provider}/{model}"),
            provider,
            model,
            quality: default_quality(),
            cost_per_1k: 0.0,
            context_window: default_context_window(),
            local: false,
            lightweight: false,
            advanced: false,
            code_generation: false,
            reasoning: false,
            compliance_approved: false,
            production_ready: false,
        }
    }
}

/// A candidate with a score and the reasons behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
    /// Ordered, human-readable reasons.
    #[serde(default)]
    pub rationale: Vec<String>,
}

impl ScoredCandidate {
    pub fn new(candidate: Candidate, score: f64) -> Self {
        Self {
            candidate,
            score,
            rationale: Vec::new(),
        }
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.rationale.push(reason.into());
        self
    }
}

/// Lookup of registered candidates.
pub trait CandidateRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<Candidate>;

    /// Candidates for `provider`, in registration order.
    fn by_provider(&self, provider: &str) -> Vec<Candidate>;

    fn all(&self) -> Vec<Candidate>;
}

/// Picks the best candidate for a task. `None` means nothing is eligible.
#[async_trait]
pub trait BasePolicyEngine: Send + Sync {
    async fn choose_best(&self, task: &TaskDescriptor) -> Option<ScoredCandidate>;
}
