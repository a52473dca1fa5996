//! Intent source — hint normalization and pattern classification.
//!
//! Classification is deterministic: categories are scored in a fixed order
//! and ties go to the earlier category.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use strata_core::IntentLayer;
use strata_core::intent::GENERAL_ASSISTANCE;

/// Confidence assigned to an explicit task-type hint.
pub const HINT_CONFIDENCE: f64 = 0.9;

/// Confidence when no pattern matches.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub const DEFAULT_SUCCESS_CRITERIA: &str =
    "Deliver a specific, actionable answer with clear next steps.";

const FOLLOW_UP_PHRASES: &[&str] = &["what about", "how do i", "can you explain", "tell me more"];
const SHIFT_PHRASES: &[&str] = &["actually", "wait", "instead", "change of plans"];

struct Category {
    name: &'static str,
    patterns: &'static [&'static str],
    success_criteria: &'static str,
    escalation: Option<&'static str>,
}

const TAXONOMY: &[Category] = &[
    Category {
        name: "architecture_design",
        patterns: &[
            "architecture",
            "design.*system",
            "system.*design",
            "technical.*design",
            "scalability",
            "microservices",
            "monolith",
            "component.*design",
        ],
        success_criteria: "Deliver a comprehensive architecture diagram with component relationships, technology choices, and scalability considerations.",
        escalation: Some("senior_architect"),
    },
    Category {
        name: "repo_analysis",
        patterns: &[
            "analyze.*repo",
            "codebase.*analysis",
            "understand.*code",
            "code.*review",
            "technical.*debt",
            "repository.*analysis",
        ],
        success_criteria: "Provide actionable insights about codebase structure, technical debt, and specific recommendations for improvement.",
        escalation: None,
    },
    Category {
        name: "implementation",
        patterns: &[
            "implement",
            "build.*feature",
            "code.*implementation",
            "develop.*solution",
            "write.*code",
            "create.*component",
        ],
        success_criteria: "Generate production-ready code with proper error handling, tests, and integration points clearly defined.",
        escalation: None,
    },
    Category {
        name: "troubleshooting",
        patterns: &[
            "bug",
            "error",
            "issue",
            "problem",
            "not.*working",
            "fix.*issue",
            "debug",
            "troubleshoot",
        ],
        success_criteria: "Identify root cause, provide clear reproduction steps, and offer a tested solution with rollback plan.",
        escalation: Some("senior_developer"),
    },
    Category {
        name: "security_analysis",
        patterns: &[
            "security",
            "vulnerability",
            "threat.*model",
            "security.*review",
            "penetration.*test",
            "security.*audit",
        ],
        success_criteria: "Identify vulnerabilities, assess risk levels, and provide prioritized remediation steps.",
        escalation: Some("security_team"),
    },
    Category {
        name: "performance_optimization",
        patterns: &[
            "performance",
            "optimize",
            "slow",
            "bottleneck",
            "latency",
            "throughput",
            "scaling",
        ],
        success_criteria: "Pinpoint bottlenecks, quantify improvements, and provide implementation steps with metrics.",
        escalation: Some("performance_engineer"),
    },
    Category {
        name: "documentation",
        patterns: &["document", "readme", "api.*doc", "technical.*writing", "knowledge.*base"],
        success_criteria: "Create clear, comprehensive documentation that enables team autonomy and reduces onboarding time.",
        escalation: None,
    },
    Category {
        name: "planning",
        patterns: &["plan", "roadmap", "strategy", "migrate", "refactor.*plan", "project.*plan"],
        success_criteria: "Deliver a phased implementation plan with dependencies, risks, and success metrics clearly defined.",
        escalation: None,
    },
];

/// Compiled patterns with their weights, parallel to [`TAXONOMY`].
static COMPILED: LazyLock<Vec<Vec<(Regex, f64)>>> = LazyLock::new(|| {
    TAXONOMY
        .iter()
        .map(|category| {
            category
                .patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok().map(|re| (re, pattern_weight(p))))
                .collect()
        })
        .collect()
});

/// Wildcard patterns span two terms and are more specific.
fn pattern_weight(pattern: &str) -> f64 {
    if pattern.contains(".*") { 1.5 } else { 1.0 }
}

fn category(name: &str) -> Option<&'static Category> {
    TAXONOMY.iter().find(|c| c.name == name)
}

/// Normalize a task-type hint: lowercase, trimmed, spaces to underscores.
pub fn normalize_hint(hint: &str) -> String {
    hint.trim().to_lowercase().replace(' ', "_")
}

/// Classify free text. Returns the category and its confidence.
pub fn classify(message: &str) -> (&'static str, f64) {
    let text = message.to_lowercase();
    let mut best: Option<(&'static str, f64)> = None;

    for (category, patterns) in TAXONOMY.iter().zip(COMPILED.iter()) {
        let matched: f64 = patterns
            .iter()
            .filter(|(re, _)| re.is_match(&text))
            .map(|(_, weight)| weight)
            .sum();
        if matched == 0.0 {
            continue;
        }
        let score = matched / category.patterns.len() as f64;
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((category.name, score));
        }
    }

    match best {
        Some((name, score)) => (name, score.min(1.0)),
        None => (GENERAL_ASSISTANCE, DEFAULT_CONFIDENCE),
    }
}

/// Constraints for a category; every category gets `max_iterations`.
pub fn constraints_for(intent: &str) -> Map<String, Value> {
    let mut constraints = Map::new();
    constraints.insert("max_iterations".into(), Value::from(3));

    let extras: Vec<(&str, Value)> = match intent {
        "architecture_design" => vec![
            ("require_diagrams", Value::Bool(true)),
            ("consider_scalability", Value::Bool(true)),
            ("include_technology_rationale", Value::Bool(true)),
        ],
        "security_analysis" => vec![
            ("require_compliance_check", Value::Bool(true)),
            ("minimum_vulnerability_severity", Value::from("medium")),
            ("include_mitigation_steps", Value::Bool(true)),
        ],
        "performance_optimization" => vec![
            ("require_benchmarks", Value::Bool(true)),
            ("include_before_after", Value::Bool(true)),
            ("quantify_improvements", Value::Bool(true)),
        ],
        "implementation" => vec![
            ("require_tests", Value::Bool(true)),
            ("include_error_handling", Value::Bool(true)),
            ("follow_style_guide", Value::Bool(true)),
        ],
        _ => Vec::new(),
    };
    for (key, value) in extras {
        constraints.insert(key.into(), value);
    }
    constraints
}

pub fn success_criteria_for(intent: &str) -> &'static str {
    category(intent)
        .map(|c| c.success_criteria)
        .unwrap_or(DEFAULT_SUCCESS_CRITERIA)
}

pub fn escalation_for(intent: &str) -> Option<&'static str> {
    category(intent).and_then(|c| c.escalation)
}

/// Build the intent layer. A non-empty hint wins over the message text.
pub fn detect_intent(message: &str, task_type: Option<&str>) -> IntentLayer {
    let hint = task_type.filter(|h| !h.trim().is_empty());

    let (primary_intent, confidence) = match hint {
        Some(hint) => (normalize_hint(hint), HINT_CONFIDENCE),
        None => {
            let (name, confidence) = classify(message);
            (name.to_string(), confidence)
        }
    };

    IntentLayer {
        success_criteria: success_criteria_for(&primary_intent).into(),
        constraints: constraints_for(&primary_intent),
        escalation_target: escalation_for(&primary_intent).map(str::to_string),
        task_type: hint.map(str::to_string),
        primary_intent,
        confidence,
    }
}

/// Adjust an intent using the last three messages of the session.
///
/// Follow-up phrasing marks the intent as a follow-up; a change-of-mind
/// phrase re-detects the intent from that message.
pub fn refine_with_history(mut intent: IntentLayer, recent_messages: &[String]) -> IntentLayer {
    let start = recent_messages.len().saturating_sub(3);
    let recent: Vec<String> = recent_messages[start..]
        .iter()
        .map(|m| m.to_lowercase())
        .collect();

    if recent
        .iter()
        .any(|m| FOLLOW_UP_PHRASES.iter().any(|p| m.contains(p)))
    {
        intent.constraints.insert("is_follow_up".into(), Value::Bool(true));
    }

    if let Some(shifted) = recent
        .iter()
        .find(|m| SHIFT_PHRASES.iter().any(|p| m.contains(p)))
    {
        let redetected = detect_intent(shifted, None);
        intent.primary_intent = redetected.primary_intent;
        intent.success_criteria = redetected.success_criteria;
        intent.escalation_target = redetected.escalation_target;
        intent.constraints.extend(redetected.constraints);
    }

    intent
}
