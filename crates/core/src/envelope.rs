//! The context envelope — everything known about one request.
//!
//! Returned by value and owned by the caller; nothing in the pipeline keeps
//! a handle to it afterwards.

use crate::domain::DomainLayer;
use crate::environment::EnvironmentLayer;
use crate::exposition::Exposition;
use crate::identity::IdentityLayer;
use crate::intent::{ERROR_RECOVERY, IntentLayer};
use crate::rules::RulesLayer;
use crate::sourced::{LayerKind, LayerReport, LayerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Narrative of the fallback envelope.
pub const FALLBACK_NARRATIVE: &str = "Context building failed, using minimal context";

/// Token usage reported by the fallback envelope.
pub const FALLBACK_TOKEN_USAGE: u64 = 100;

/// How an envelope was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// Every enabled layer was computed from live inputs.
    Complete,
    /// At least one layer degraded to defaults.
    Partial,
    /// The pipeline failed; only the minimal fallback is present.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEnvelope {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: EnvelopeStatus,

    pub identity: IdentityLayer,
    pub intent: IntentLayer,
    pub domain: DomainLayer,
    pub rules: RulesLayer,
    pub environment: EnvironmentLayer,

    pub exposition: Exposition,

    pub token_budget_used: u64,
    pub processing_time_ms: u64,

    /// One report per layer, in layer order.
    #[serde(default)]
    pub layers: Vec<LayerReport>,
}

impl ContextEnvelope {
    /// The minimal envelope returned when assembly fails.
    ///
    /// `error` must already be sanitized; it is the only payload carried.
    pub fn fallback(id: Uuid, error: impl Into<String>, processing_time_ms: u64) -> Self {
        let intent = IntentLayer {
            primary_intent: ERROR_RECOVERY.into(),
            ..IntentLayer::default()
        };

        let mut structured = Map::new();
        structured.insert("error".into(), Value::String(error.into()));

        let exposition = Exposition {
            narrative: FALLBACK_NARRATIVE.into(),
            structured,
            token_count: FALLBACK_TOKEN_USAGE,
            ..Exposition::default()
        };

        Self {
            id,
            created_at: Utc::now(),
            status: EnvelopeStatus::Fallback,
            identity: IdentityLayer::default(),
            intent,
            domain: DomainLayer::default(),
            rules: RulesLayer::default(),
            environment: EnvironmentLayer::default(),
            exposition,
            token_budget_used: FALLBACK_TOKEN_USAGE,
            processing_time_ms,
            layers: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.status == EnvelopeStatus::Fallback
    }

    pub fn layer_status(&self, kind: LayerKind) -> Option<&LayerStatus> {
        self.layers
            .iter()
            .find(|r| r.layer == kind)
            .map(|r| &r.status)
    }

    pub fn degraded_layers(&self) -> Vec<LayerKind> {
        self.layers
            .iter()
            .filter(|r| matches!(r.status, LayerStatus::Degraded { .. }))
            .map(|r| r.layer)
            .collect()
    }

    /// Status implied by a set of layer reports.
    pub fn status_for(reports: &[LayerReport]) -> EnvelopeStatus {
        if reports
            .iter()
            .any(|r| matches!(r.status, LayerStatus::Degraded { .. }))
        {
            EnvelopeStatus::Partial
        } else {
            EnvelopeStatus::Complete
        }
    }
}
