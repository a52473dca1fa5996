//! Source adapters — one per layer.
//!
//! Each adapter turns raw inputs (and an optional collaborator) into a
//! [`Sourced`](strata_core::Sourced) layer. Adapters never return errors:
//! a failed collaborator or unsafe input yields a degraded layer instead.
//!
//! | Layer | Inputs | Collaborator |
//! |-------|--------|--------------|
//! | Identity | auth claims | [`HistoryLookup`](strata_core::HistoryLookup) |
//! | Intent | message, task-type hint, session history | — |
//! | Domain | repository path, project id, metadata | [`DomainAnalyzer`](strata_core::DomainAnalyzer) |
//! | Rules | tenant policies | — |
//! | Environment | deployment settings | [`SettingsSource`](strata_core::SettingsSource), [`LoadProbe`](strata_core::LoadProbe) |

pub mod domain;
pub mod environment;
pub mod identity;
pub mod intent;
pub mod rules;

pub use domain::{DomainInput, build_domain, scan_markers};
pub use environment::build_environment;
pub use identity::{build_identity, identity_from_claims};
pub use intent::{detect_intent, refine_with_history};
pub use rules::build_rules;
