//! Multi-source context assembly for strata.
//!
//! An [`EnvelopeBuilder`] gathers five layers of context for one request
//! (identity, intent, domain, rules, environment), applies request-scoped
//! overrides, fuses everything into an [`Exposition`](strata_core::Exposition),
//! and clamps it to the token budget. The result is a
//! [`ContextEnvelope`](strata_core::ContextEnvelope) owned by the caller.

pub mod budget;
pub mod builder;
pub mod cache;
pub mod exposition;
pub mod layers;
pub mod overrides;
pub mod sources;
pub mod token;

pub use budget::enforce_budget;
pub use builder::{BuildRequest, Collaborators, EnvelopeBuilder, RequestBody};
pub use cache::{CachedDomainAnalyzer, CachedHistoryLookup};
pub use exposition::synthesize;
pub use layers::Layers;
pub use overrides::apply_overrides;
