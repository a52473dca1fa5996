//! Context-aware candidate selection for strata.
//!
//! The [`ContextAwareRouter`] enriches a [`TaskDescriptor`](strata_core::TaskDescriptor)
//! from a [`ContextEnvelope`](strata_core::ContextEnvelope), applies the
//! context routing rules, resolves a candidate (override or base policy
//! engine), filters it against the hard walls, falls back when rejected,
//! and adjusts invocation parameters.

pub mod fallback;
pub mod filter;
pub mod params;
pub mod policy;
pub mod registry;
pub mod router;
pub mod rules;

pub use filter::{Rejection, check_candidate};
pub use params::{InvocationParams, adjust_parameters};
pub use policy::ScoringPolicyEngine;
pub use registry::StaticRegistry;
pub use router::{ContextAwareRouter, RoutingDecision, RoutingFactors, SelectionState};
pub use rules::{ContextRouting, apply_context_routing, enrich_task};
