//! Injected lookup collaborators used by the source adapters.
//!
//! Every collaborator is optional. An adapter without one computes its layer
//! from raw inputs alone.

use crate::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// What the history store knows about a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub session_count: u32,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait HistoryLookup: Send + Sync {
    /// `Ok(None)` when the user has no history.
    async fn lookup(&self, user_id: &str) -> std::result::Result<Option<HistoryRecord>, SourceError>;
}

/// Result of analyzing a confined repository path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysis {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    #[serde(default)]
    pub related_docs: BTreeMap<String, String>,
    #[serde(default)]
    pub project_metadata: Map<String, Value>,
}

#[async_trait]
pub trait DomainAnalyzer: Send + Sync {
    /// Only ever called with a path that passed confinement.
    async fn analyze(&self, path: &Path) -> std::result::Result<Option<DomainAnalysis>, SourceError>;
}

/// Key/value deployment settings (`ENV`, `FEATURE_*`, `RATE_LIMIT_*`, ...).
pub trait SettingsSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SettingsSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed settings, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub HashMap<String, String>);

impl StaticSettings {
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl SettingsSource for StaticSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Utilization fractions in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    pub cpu: f64,
    pub memory: f64,
}

impl LoadSample {
    /// The busier of the two resources.
    pub fn system_load(&self) -> f64 {
        self.cpu.max(self.memory).clamp(0.0, 1.0)
    }
}

/// Runtime telemetry for the environment layer.
///
/// Async so that a slow probe yields to the executor and the environment
/// adapter's timeout can fire.
#[async_trait]
pub trait LoadProbe: Send + Sync {
    async fn sample(&self) -> Option<LoadSample>;

    async fn active_sessions(&self) -> Option<u32> {
        None
    }
}
