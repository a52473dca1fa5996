//! Fresh-versus-degraded results for source adapters.
//!
//! Every adapter returns a [`Sourced`] value. A degraded value is still a
//! usable layer (safe defaults), but the reason travels with it so the
//! envelope can report which layers were not computed from live inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five source layers of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Identity,
    Intent,
    Domain,
    Rules,
    Environment,
}

impl LayerKind {
    /// All layers, in narrative order.
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Identity,
        LayerKind::Intent,
        LayerKind::Domain,
        LayerKind::Rules,
        LayerKind::Environment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Identity => "identity",
            LayerKind::Intent => "intent",
            LayerKind::Domain => "domain",
            LayerKind::Rules => "rules",
            LayerKind::Environment => "environment",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an adapter fell back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradeReason {
    /// The adapter did not finish within its configured timeout.
    TimedOut { timeout_ms: u64 },
    /// The adapter panicked; the payload is not preserved.
    Panicked,
    /// A collaborator failed; the layer holds whatever could be computed without it.
    SourceFailed { message: String },
    /// Input was rejected before any lookup ran.
    InvalidInput { message: String },
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::TimedOut { timeout_ms } => write!(f, "timed out after {timeout_ms}ms"),
            DegradeReason::Panicked => f.write_str("adapter panicked"),
            DegradeReason::SourceFailed { message } => write!(f, "source failed: {message}"),
            DegradeReason::InvalidInput { message } => write!(f, "invalid input: {message}"),
        }
    }
}

/// A layer value tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    /// Computed from live inputs and collaborators.
    Fresh(T),
    /// Safe default or partial value; `reason` says what went wrong.
    Degraded { value: T, reason: DegradeReason },
}

impl<T> Sourced<T> {
    pub fn degraded(value: T, reason: DegradeReason) -> Self {
        Sourced::Degraded { value, reason }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Sourced::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Sourced::Fresh(value) | Sourced::Degraded { value, .. } => value,
        }
    }

    pub fn value_mut(&mut self) -> &mut T {
        match self {
            Sourced::Fresh(value) | Sourced::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Sourced::Fresh(value) | Sourced::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Sourced::Fresh(_) => None,
            Sourced::Degraded { reason, .. } => Some(reason),
        }
    }

    /// Split into the value and the status to report for it.
    pub fn into_parts(self) -> (T, LayerStatus) {
        match self {
            Sourced::Fresh(value) => (value, LayerStatus::Fresh),
            Sourced::Degraded { value, reason } => (value, LayerStatus::Degraded { reason }),
        }
    }
}

/// Per-layer status recorded on the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerStatus {
    Fresh,
    Degraded { reason: DegradeReason },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerReport {
    pub layer: LayerKind,
    #[serde(flatten)]
    pub status: LayerStatus,
}
