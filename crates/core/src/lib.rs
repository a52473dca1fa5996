//! # Strata Core
//!
//! Domain types, collaborator traits, and error definitions for strata
//! context envelopes and context-aware routing.
//!
//! ## Design Philosophy
//!
//! Every external capability (history store, repository analyzer, telemetry,
//! candidate registry, base policy engine) is a trait here. Implementations
//! live in their respective crates or in the host application. This keeps
//! the pipeline testable with hand-written stubs and the dependency graph
//! pointing inward.

pub mod candidate;
pub mod collaborator;
pub mod domain;
pub mod envelope;
pub mod environment;
pub mod error;
pub mod exposition;
pub mod identity;
pub mod intent;
pub mod merge;
pub mod overrides;
pub mod rules;
pub mod sourced;
pub mod task;

// Re-export key types at crate root for ergonomics
pub use candidate::{BasePolicyEngine, Candidate, CandidateRegistry, ScoredCandidate};
pub use collaborator::{
    DomainAnalysis, DomainAnalyzer, HistoryLookup, HistoryRecord, LoadProbe, LoadSample,
    ProcessEnv, SettingsSource, StaticSettings,
};
pub use domain::{DomainLayer, DomainState};
pub use envelope::{ContextEnvelope, EnvelopeStatus};
pub use environment::{EnvironmentLayer, EnvironmentTier, FeatureGate, OperationalConstraints};
pub use error::{ContextError, Error, RouterError, SourceError};
pub use exposition::Exposition;
pub use identity::{ExpertiseTier, IdentityLayer, InteractionSignals};
pub use intent::IntentLayer;
pub use overrides::{
    ContextOverride, DomainOverride, EnvironmentOverride, IdentityOverride, IntentOverride,
    RulesOverride,
};
pub use rules::{ComplianceCheck, RuleProbe, RulesLayer};
pub use sourced::{DegradeReason, LayerKind, LayerReport, LayerStatus, Sourced};
pub use task::{Capabilities, Criticality, RoutingHints, TaskDescriptor};
