//! Configuration loading, validation, and tier presets for strata.
//!
//! A [`StrataConfig`] is built once (defaults, a TOML file, or a tier
//! preset), validated, and then shared read-only, typically behind an
//! `Arc`. Nothing mutates it after construction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_core::{EnvironmentTier, FeatureGate, LayerKind};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Envelope assembly settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Path confinement and message sanitization
    #[serde(default)]
    pub security: SecurityConfig,

    /// Context-aware routing thresholds and fallbacks
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// Envelope assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Ceiling on the estimated exposition size
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: u64,

    /// Share of the budget reserved for structured data when truncating
    #[serde(default = "default_token_safety_margin")]
    pub token_safety_margin: f64,

    #[serde(default)]
    pub layers: LayersConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Run source adapters concurrently
    #[serde(default = "default_true")]
    pub parallel_build: bool,

    /// Aggregate deadline for one envelope build
    #[serde(default = "default_build_timeout_ms")]
    pub build_timeout_ms: u64,

    /// Let the envelope steer candidate selection
    #[serde(default = "default_true")]
    pub influence_routing: bool,

    /// Scale applied to context-derived routing bonuses
    #[serde(default = "default_routing_weight")]
    pub routing_weight: f64,
}

fn default_max_total_tokens() -> u64 {
    8000
}
fn default_token_safety_margin() -> f64 {
    0.1
}
fn default_true() -> bool {
    true
}
fn default_cache_ttl_seconds() -> u64 {
    300
}
fn default_cache_max_size() -> usize {
    1000
}
fn default_build_timeout_ms() -> u64 {
    15_000
}
fn default_routing_weight() -> f64 {
    0.3
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_total_tokens: default_max_total_tokens(),
            token_safety_margin: default_token_safety_margin(),
            layers: LayersConfig::default(),
            sources: SourcesConfig::default(),
            cache_enabled: true,
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_size: default_cache_max_size(),
            parallel_build: true,
            build_timeout_ms: default_build_timeout_ms(),
            influence_routing: true,
            routing_weight: default_routing_weight(),
        }
    }
}

impl ContextConfig {
    /// Multiplier applied to the narrative length when truncating.
    pub fn safety_factor(&self) -> f64 {
        1.0 - self.token_safety_margin
    }
}

/// Per-layer enable flag and narrative budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Budget for this layer's narrative section
    pub max_tokens: u64,
}

impl LayerSettings {
    const fn with_budget(max_tokens: u64) -> Self {
        Self {
            enabled: true,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayersConfig {
    #[serde(default = "default_identity_layer")]
    pub identity: LayerSettings,
    #[serde(default = "default_intent_layer")]
    pub intent: LayerSettings,
    #[serde(default = "default_domain_layer")]
    pub domain: LayerSettings,
    #[serde(default = "default_rules_layer")]
    pub rules: LayerSettings,
    #[serde(default = "default_environment_layer")]
    pub environment: LayerSettings,
}

fn default_identity_layer() -> LayerSettings {
    LayerSettings::with_budget(2000)
}
fn default_intent_layer() -> LayerSettings {
    LayerSettings::with_budget(1000)
}
fn default_domain_layer() -> LayerSettings {
    LayerSettings::with_budget(2000)
}
fn default_rules_layer() -> LayerSettings {
    LayerSettings::with_budget(1500)
}
fn default_environment_layer() -> LayerSettings {
    LayerSettings::with_budget(1000)
}

impl Default for LayersConfig {
    fn default() -> Self {
        Self {
            identity: default_identity_layer(),
            intent: default_intent_layer(),
            domain: default_domain_layer(),
            rules: default_rules_layer(),
            environment: default_environment_layer(),
        }
    }
}

impl LayersConfig {
    pub fn get(&self, kind: LayerKind) -> &LayerSettings {
        match kind {
            LayerKind::Identity => &self.identity,
            LayerKind::Intent => &self.intent,
            LayerKind::Domain => &self.domain,
            LayerKind::Rules => &self.rules,
            LayerKind::Environment => &self.environment,
        }
    }

    pub fn enabled(&self, kind: LayerKind) -> bool {
        self.get(kind).enabled
    }
}

/// Bounds for one source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Higher runs first in sequential builds
    pub priority: u32,

    pub timeout_ms: u64,

    /// Extra attempts against the adapter's collaborator, inside the timeout
    #[serde(default)]
    pub retry_attempts: u32,

    /// TTL for the adapter's lookup cache (0 = no caching)
    #[serde(default)]
    pub cache_ttl_seconds: u64,
}

impl SourceSettings {
    const fn new(priority: u32, timeout_ms: u64, retry_attempts: u32, cache_ttl_seconds: u64) -> Self {
        Self {
            priority,
            timeout_ms,
            retry_attempts,
            cache_ttl_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_identity_source")]
    pub identity: SourceSettings,
    #[serde(default = "default_intent_source")]
    pub intent: SourceSettings,
    #[serde(default = "default_domain_source")]
    pub domain: SourceSettings,
    #[serde(default = "default_rules_source")]
    pub rules: SourceSettings,
    #[serde(default = "default_environment_source")]
    pub environment: SourceSettings,
}

fn default_identity_source() -> SourceSettings {
    SourceSettings::new(100, 2000, 2, 600)
}
fn default_intent_source() -> SourceSettings {
    SourceSettings::new(95, 100, 0, 0)
}
fn default_domain_source() -> SourceSettings {
    SourceSettings::new(80, 10_000, 2, 1800)
}
fn default_rules_source() -> SourceSettings {
    SourceSettings::new(85, 1000, 0, 300)
}
fn default_environment_source() -> SourceSettings {
    SourceSettings::new(60, 500, 0, 0)
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            identity: default_identity_source(),
            intent: default_intent_source(),
            domain: default_domain_source(),
            rules: default_rules_source(),
            environment: default_environment_source(),
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, kind: LayerKind) -> &SourceSettings {
        match kind {
            LayerKind::Identity => &self.identity,
            LayerKind::Intent => &self.intent,
            LayerKind::Domain => &self.domain,
            LayerKind::Rules => &self.rules,
            LayerKind::Environment => &self.environment,
        }
    }

    /// Layers ordered by descending priority; ties keep layer order.
    pub fn by_priority(&self) -> Vec<LayerKind> {
        let mut kinds = LayerKind::ALL.to_vec();
        kinds.sort_by(|a, b| self.get(*b).priority.cmp(&self.get(*a).priority));
        kinds
    }
}

/// Repository confinement and error sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Confinement root for repository paths
    #[serde(default = "default_repo_base_dir")]
    pub allowed_repo_base_dir: PathBuf,

    #[serde(default = "default_max_repo_path_length")]
    pub max_repo_path_length: usize,

    /// Substrings (or `*` globs on a path component) that are never accessed
    #[serde(default = "default_blocked_path_patterns")]
    pub blocked_path_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub sanitize_error_messages: bool,

    /// Case-insensitive keywords that force a generic error message
    #[serde(default = "default_sensitive_keywords")]
    pub sensitive_keywords: Vec<String>,
}

fn default_repo_base_dir() -> PathBuf {
    PathBuf::from("/tmp/repos")
}
fn default_max_repo_path_length() -> usize {
    256
}
fn default_blocked_path_patterns() -> Vec<String> {
    [
        ".env", ".env.*", "*.key", "*.pem", "*.p12", "id_rsa", "id_ed25519", ".git/", ".svn/",
        ".hg/", "__pycache__/", "*.pyc", "node_modules/", ".npm/", ".venv/", "venv/", "*.log",
        "*.tmp",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_sensitive_keywords() -> Vec<String> {
    [
        "password", "passwd", "pwd", "secret", "token", "jwt", "key", "credential", "auth",
        "session", "cookie", "database", "db", "sql", "internal", "stack trace",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_repo_base_dir: default_repo_base_dir(),
            max_repo_path_length: default_max_repo_path_length(),
            blocked_path_patterns: default_blocked_path_patterns(),
            sanitize_error_messages: true,
            sensitive_keywords: default_sensitive_keywords(),
        }
    }
}

/// Routing thresholds, defaults, and fallback candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Load above which priority rises and lightweight candidates are preferred
    #[serde(default = "default_high_load_threshold")]
    pub high_load_threshold: f64,

    /// Load above which non-essential features are shed
    #[serde(default = "default_load_shedding_threshold")]
    pub load_shedding_threshold: f64,

    /// Candidate forced in production when routing mode is local-preferred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_override_candidate: Option<String>,

    /// Local/offline candidates tried first after a filter rejection
    #[serde(default = "default_local_fallback_candidates")]
    pub local_fallback_candidates: Vec<String>,

    /// Providers searched when the hard walls declare no allow-list
    #[serde(default = "default_fallback_providers")]
    pub default_fallback_providers: Vec<String>,

    /// Beta feature audience
    #[serde(default)]
    pub beta_users: Vec<String>,

    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u64,

    #[serde(default = "default_beginner_temperature_ceiling")]
    pub beginner_temperature_ceiling: f64,

    #[serde(default = "default_expert_temperature_floor")]
    pub expert_temperature_floor: f64,

    /// Response-length floor for design and implementation work
    #[serde(default = "default_long_form_max_tokens")]
    pub long_form_max_tokens: u64,
}

fn default_high_load_threshold() -> f64 {
    0.8
}
fn default_load_shedding_threshold() -> f64 {
    0.9
}
fn default_local_fallback_candidates() -> Vec<String> {
    vec!["ollama/llama2".into(), "ollama/codellama".into()]
}
fn default_fallback_providers() -> Vec<String> {
    vec!["anthropic".into()]
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u64 {
    2000
}
fn default_beginner_temperature_ceiling() -> f64 {
    0.5
}
fn default_expert_temperature_floor() -> f64 {
    0.8
}
fn default_long_form_max_tokens() -> u64 {
    4000
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            high_load_threshold: default_high_load_threshold(),
            load_shedding_threshold: default_load_shedding_threshold(),
            production_override_candidate: None,
            local_fallback_candidates: default_local_fallback_candidates(),
            default_fallback_providers: default_fallback_providers(),
            beta_users: Vec::new(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            beginner_temperature_ceiling: default_beginner_temperature_ceiling(),
            expert_temperature_floor: default_expert_temperature_floor(),
            long_form_max_tokens: default_long_form_max_tokens(),
        }
    }
}

impl RoutingConfig {
    /// Feature gate for [`EnvironmentLayer::feature_enabled`](strata_core::EnvironmentLayer::feature_enabled).
    pub fn feature_gate(&self) -> FeatureGate {
        FeatureGate {
            beta_users: self.beta_users.clone(),
            load_shedding_threshold: self.load_shedding_threshold,
        }
    }
}

impl StrataConfig {
    /// Preset for a deployment tier.
    ///
    /// Production trades token budget and timeouts for latency; development
    /// relaxes timeouts for debugging and shortens cache lifetimes.
    pub fn for_tier(tier: EnvironmentTier) -> Self {
        let mut config = Self::default();
        let context = &mut config.context;
        match tier {
            EnvironmentTier::Production => {
                context.max_total_tokens = 6000;
                context.cache_ttl_seconds = 600;
                context.build_timeout_ms = 10_000;
                context.sources.identity.timeout_ms = 1500;
                context.sources.domain.timeout_ms = 8000;
            }
            EnvironmentTier::Development => {
                context.max_total_tokens = 8000;
                context.cache_ttl_seconds = 60;
                context.build_timeout_ms = 30_000;
                context.sources.identity.timeout_ms = 5000;
                context.sources.domain.timeout_ms = 20_000;
            }
            EnvironmentTier::Staging => {}
        }
        config
    }

    /// Preset chosen from `ENV`/`ENVIRONMENT`, plus `STRATA_*` overrides.
    ///
    /// - `STRATA_ALLOWED_REPO_BASE_DIR` replaces the confinement root
    /// - `STRATA_MAX_CONTEXT_TOKENS` replaces the token ceiling
    pub fn from_env() -> Result<Self, ConfigError> {
        let tier = std::env::var("ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .ok()
            .and_then(|v| v.parse::<EnvironmentTier>().ok())
            .unwrap_or_default();
        let mut config = Self::for_tier(tier);

        if let Ok(dir) = std::env::var("STRATA_ALLOWED_REPO_BASE_DIR") {
            config.security.allowed_repo_base_dir = PathBuf::from(dir);
        }

        if let Ok(raw) = std::env::var("STRATA_MAX_CONTEXT_TOKENS") {
            config.context.max_total_tokens = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "STRATA_MAX_CONTEXT_TOKENS must be an integer, got '{raw}'"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let context = &self.context;

        if context.max_total_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_total_tokens must be > 0".into(),
            ));
        }

        if !(0.0..=0.5).contains(&context.token_safety_margin) {
            return Err(ConfigError::ValidationError(
                "context.token_safety_margin must be between 0.0 and 0.5".into(),
            ));
        }

        if !(0.0..=1.0).contains(&context.routing_weight) {
            return Err(ConfigError::ValidationError(
                "context.routing_weight must be between 0.0 and 1.0".into(),
            ));
        }

        if context.build_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "context.build_timeout_ms must be > 0".into(),
            ));
        }

        for kind in LayerKind::ALL {
            if context.sources.get(kind).timeout_ms == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "context.sources.{kind}.timeout_ms must be > 0"
                )));
            }
        }

        let routing = &self.routing;
        for (name, value) in [
            ("high_load_threshold", routing.high_load_threshold),
            ("load_shedding_threshold", routing.load_shedding_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "routing.{name} must be between 0.0 and 1.0"
                )));
            }
        }

        if routing.beginner_temperature_ceiling > routing.expert_temperature_floor {
            return Err(ConfigError::ValidationError(
                "routing.beginner_temperature_ceiling must not exceed expert_temperature_floor"
                    .into(),
            ));
        }

        if self.security.max_repo_path_length == 0 {
            return Err(ConfigError::ValidationError(
                "security.max_repo_path_length must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Render the default configuration as TOML.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
