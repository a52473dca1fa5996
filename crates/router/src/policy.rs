//! Default base policy engine — scores every registered candidate.
//!
//! Eligibility: the context window must fit the task, compliance-bound
//! tasks need a compliance-approved candidate, and long-context tasks need
//! a long window. Score:
//!
//! ```text
//! quality * criticality_weight - cost_per_1k * COST_WEIGHT
//!   + routing_weight * (local + lightweight + advanced bonuses)
//!   + CAPABILITY_BONUS per requested capability the candidate has
//! ```
//!
//! Ties go to the lexicographically smaller candidate id.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use strata_config::ContextConfig;
use strata_core::{BasePolicyEngine, Candidate, CandidateRegistry, ScoredCandidate, TaskDescriptor};
use tracing::debug;

/// Penalty per cost unit.
pub const COST_WEIGHT: f64 = 0.1;

/// Bonus for each routing hint a candidate satisfies, before `routing_weight`.
pub const HINT_BONUS: f64 = 1.0;

/// Bonus for each requested capability (code generation, reasoning) a
/// candidate declares.
pub const CAPABILITY_BONUS: f64 = 0.2;

/// Minimum window for tasks that need long context.
pub const LONG_CONTEXT_WINDOW: u64 = 32_000;

pub struct ScoringPolicyEngine {
    registry: Arc<dyn CandidateRegistry>,
    routing_weight: f64,
}

impl ScoringPolicyEngine {
    pub fn new(registry: Arc<dyn CandidateRegistry>, routing_weight: f64) -> Self {
        Self {
            registry,
            routing_weight: routing_weight.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(registry: Arc<dyn CandidateRegistry>, context: &ContextConfig) -> Self {
        Self::new(registry, context.routing_weight)
    }

    fn eligible(&self, candidate: &Candidate, task: &TaskDescriptor) -> bool {
        if candidate.context_window < task.context_size {
            return false;
        }
        if requires_compliance(task) && !candidate.compliance_approved {
            return false;
        }
        if task.capabilities.long_context && candidate.context_window < LONG_CONTEXT_WINDOW {
            return false;
        }
        true
    }

    /// Score one candidate, recording each contributing factor.
    pub fn score(&self, candidate: &Candidate, task: &TaskDescriptor) -> ScoredCandidate {
        let weight = task.criticality.weight();
        let mut score = candidate.quality * weight;
        let mut rationale = vec![format!(
            "quality {:.2} x criticality {:?} ({weight})",
            candidate.quality, task.criticality
        )];

        if candidate.cost_per_1k > 0.0 {
            score -= candidate.cost_per_1k * COST_WEIGHT;
            rationale.push(format!("cost penalty {:.3}", candidate.cost_per_1k * COST_WEIGHT));
        }

        let bonus = HINT_BONUS * self.routing_weight;
        let hints = &task.hints;
        if hints.prefer_local && candidate.local {
            score += bonus;
            rationale.push("local candidate preferred".into());
        }
        if hints.prefer_lightweight && candidate.lightweight {
            score += bonus;
            rationale.push("lightweight candidate preferred".into());
        }
        if hints.allow_advanced && candidate.advanced {
            score += bonus;
            rationale.push("advanced candidate allowed".into());
        }

        let needs = &task.capabilities;
        if needs.code_generation && candidate.code_generation {
            score += CAPABILITY_BONUS;
            rationale.push("code generation capability".into());
        }
        if needs.reasoning && candidate.reasoning {
            score += CAPABILITY_BONUS;
            rationale.push("reasoning capability".into());
        }

        ScoredCandidate {
            candidate: candidate.clone(),
            score,
            rationale,
        }
    }
}

fn requires_compliance(task: &TaskDescriptor) -> bool {
    task.hints.compliance_required || !task.compliance.is_empty()
}

#[async_trait]
impl BasePolicyEngine for ScoringPolicyEngine {
    async fn choose_best(&self, task: &TaskDescriptor) -> Option<ScoredCandidate> {
        let best = self
            .registry
            .all()
            .iter()
            .filter(|c| self.eligible(c, task))
            .map(|c| self.score(c, task))
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.candidate.id.cmp(&a.candidate.id))
            });

        match &best {
            Some(choice) => debug!(
                candidate = %choice.candidate.id,
                score = choice.score,
                task_type = %task.task_type,
                "Policy engine selected candidate"
            ),
            None => debug!(task_type = %task.task_type, "No eligible candidate"),
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use strata_core::{Capabilities, Criticality};

    fn candidate(provider: &str, model: &str, quality: f64) -> Candidate {
        Candidate {
            quality,
            ..Candidate::new(provider, model)
        }
    }

    fn engine(registry: StaticRegistry) -> ScoringPolicyEngine {
        ScoringPolicyEngine::new(Arc::new(registry), 0.3)
    }

    #[tokio::test]
    async fn highest_quality_wins() {
        let engine = engine(
            StaticRegistry::new()
                .with(candidate("openai", "gpt-4o", 0.9))
                .with(candidate("anthropic", "claude-3-haiku", 0.6)),
        );
        let best = engine.choose_best(&TaskDescriptor::new("qa")).await.unwrap();
        assert_eq!(best.candidate.id, "openai/gpt-4o");
        assert!(!best.rationale.is_empty());
    }

    #[tokio::test]
    async fn ties_break_by_id() {
        let engine = engine(
            StaticRegistry::new()
                .with(candidate("openai", "gpt-4o", 0.8))
                .with(candidate("anthropic", "claude-3-opus", 0.8)),
        );
        let best = engine.choose_best(&TaskDescriptor::new("qa")).await.unwrap();
        assert_eq!(best.candidate.id, "anthropic/claude-3-opus");
    }

    #[tokio::test]
    async fn context_window_must_fit() {
        let mut small = candidate("openai", "gpt-4o", 0.95);
        small.context_window = 4096;
        let engine = engine(
            StaticRegistry::new()
                .with(small)
                .with(candidate("anthropic", "claude-3-haiku", 0.5)),
        );
        let mut task = TaskDescriptor::new("qa");
        task.context_size = 6000;
        let best = engine.choose_best(&task).await.unwrap();
        assert_eq!(best.candidate.id, "anthropic/claude-3-haiku");
    }

    #[tokio::test]
    async fn compliance_and_long_context_filter() {
        let mut approved = candidate("anthropic", "claude-3-opus", 0.6);
        approved.compliance_approved = true;
        approved.context_window = 200_000;
        let engine = engine(
            StaticRegistry::new()
                .with(candidate("openai", "gpt-4o", 0.9))
                .with(approved),
        );

        let mut task = TaskDescriptor::new("audit").with_capabilities(Capabilities {
            long_context: true,
            ..Capabilities::default()
        });
        task.hints.compliance_required = true;
        let best = engine.choose_best(&task).await.unwrap();
        assert_eq!(best.candidate.id, "anthropic/claude-3-opus");

        task.hints.compliance_required = false;
        task.compliance.clear();
        // gpt-4o still lacks the long window.
        let best = engine.choose_best(&task).await.unwrap();
        assert_eq!(best.candidate.id, "anthropic/claude-3-opus");
    }

    #[tokio::test]
    async fn hints_shift_the_choice() {
        let mut local = candidate("ollama", "llama2", 0.6);
        local.local = true;
        let engine = engine(
            StaticRegistry::new()
                .with(candidate("openai", "gpt-4o", 0.7))
                .with(local),
        );

        let mut task = TaskDescriptor::new("qa");
        assert_eq!(
            engine.choose_best(&task).await.unwrap().candidate.id,
            "openai/gpt-4o"
        );
        task.hints.prefer_local = true;
        let best = engine.choose_best(&task).await.unwrap();
        assert_eq!(best.candidate.id, "ollama/llama2");
        assert!(best.rationale.iter().any(|r| r.contains("local")));
    }

    #[tokio::test]
    async fn criticality_and_cost_weigh_in() {
        let mut cheap = candidate("anthropic", "claude-3-haiku", 0.7);
        cheap.cost_per_1k = 0.25;
        let mut pricey = candidate("openai", "gpt-4o", 0.8);
        pricey.cost_per_1k = 1.5;
        let engine = engine(StaticRegistry::new().with(cheap).with(pricey));

        // 0.7 - 0.025 beats 0.8 - 0.15
        let task = TaskDescriptor::new("qa");
        assert_eq!(
            engine.choose_best(&task).await.unwrap().candidate.id,
            "anthropic/claude-3-haiku"
        );
        // 1.6 - 0.15 beats 1.4 - 0.025
        let task = task.with_criticality(Criticality::Critical);
        assert_eq!(
            engine.choose_best(&task).await.unwrap().candidate.id,
            "openai/gpt-4o"
        );
    }

    #[tokio::test]
    async fn requested_capabilities_earn_a_bonus() {
        let mut coder = candidate("ollama", "codellama", 0.7);
        coder.code_generation = true;
        let mut thinker = candidate("anthropic", "claude-3-opus", 0.75);
        thinker.reasoning = true;
        let engine = engine(StaticRegistry::new().with(coder).with(thinker));

        assert_eq!(
            engine.choose_best(&TaskDescriptor::new("qa")).await.unwrap().candidate.id,
            "anthropic/claude-3-opus"
        );

        let task = TaskDescriptor::new("impl").with_capabilities(Capabilities {
            code_generation: true,
            ..Capabilities::default()
        });
        let best = engine.choose_best(&task).await.unwrap();
        assert_eq!(best.candidate.id, "ollama/codellama");
        assert!(best.rationale.iter().any(|r| r.contains("code generation")));

        let task = TaskDescriptor::new("design").with_capabilities(Capabilities {
            reasoning: true,
            ..Capabilities::default()
        });
        assert_eq!(
            engine.choose_best(&task).await.unwrap().candidate.id,
            "anthropic/claude-3-opus"
        );
    }

    #[tokio::test]
    async fn empty_registry_yields_none() {
        let engine = engine(StaticRegistry::new());
        assert!(engine.choose_best(&TaskDescriptor::new("qa")).await.is_none());
    }
}
