//! The five computed layers of one envelope, before synthesis.

use strata_core::{DomainLayer, EnvironmentLayer, IdentityLayer, IntentLayer, RulesLayer};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layers {
    pub identity: IdentityLayer,
    pub intent: IntentLayer,
    pub domain: DomainLayer,
    pub rules: RulesLayer,
    pub environment: EnvironmentLayer,
}
