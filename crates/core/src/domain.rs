//! Domain layer — the workspace a request concerns.
//!
//! A repository path only ever reaches this layer after passing the
//! confinement check. A rejected path produces [`DomainState::InvalidPath`]
//! and the sentinel summary; it is never scanned, not even partially.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Summary text reported for a path that failed confinement.
pub const INVALID_PATH_SUMMARY: &str = "invalid path";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DomainState {
    /// No repository path was supplied.
    #[default]
    NoRepository,
    /// The path passed confinement and was analyzed.
    Analyzed,
    /// The path was rejected; `reason` names the violated rule.
    InvalidPath { reason: String },
    /// The path was valid but nothing exists there yet.
    NotFound,
    /// The path was valid but analysis could not complete.
    AnalysisFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainLayer {
    #[serde(default)]
    pub state: DomainState,

    /// Absolute path inside the confinement root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Component tag → short description.
    #[serde(default)]
    pub components: BTreeMap<String, String>,

    /// Document name → location.
    #[serde(default)]
    pub related_docs: BTreeMap<String, String>,

    #[serde(default)]
    pub project_metadata: Map<String, Value>,

    /// Derived edges between components, docs, and technologies.
    #[serde(default)]
    pub relationships: BTreeMap<String, Vec<String>>,
}

impl DomainLayer {
    /// The sentinel layer for a rejected path.
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Self {
            state: DomainState::InvalidPath {
                reason: reason.into(),
            },
            summary: Some(INVALID_PATH_SUMMARY.into()),
            ..Self::default()
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.state, DomainState::InvalidPath { .. })
    }

    pub fn is_empty(&self) -> bool {
        self.repo_path.is_none()
            && self.summary.is_none()
            && self.components.is_empty()
            && self.project_metadata.is_empty()
    }

    /// Recompute `relationships` from components, docs, and project metadata.
    pub fn derive_relationships(&mut self) {
        let mut relationships = BTreeMap::new();

        if !self.components.is_empty() {
            let components: Vec<String> = self.components.keys().cloned().collect();
            let has = |name: &str| self.components.contains_key(name);

            if has("frontend") && has("backend") {
                relationships.insert(
                    "frontend_backend".to_string(),
                    vec!["frontend".to_string(), "backend".to_string()],
                );
            }
            if has("backend") && has("database") {
                relationships.insert(
                    "backend_database".to_string(),
                    vec!["backend".to_string(), "database".to_string()],
                );
            }
            relationships.insert("components".to_string(), components);
        }

        if !self.related_docs.is_empty() {
            relationships.insert(
                "documentation".to_string(),
                self.related_docs.keys().cloned().collect(),
            );
        }

        if let Some(Value::Array(stack)) = self.project_metadata.get("tech_stack") {
            let technologies: Vec<String> = stack
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if !technologies.is_empty() {
                relationships.insert("technologies".to_string(), technologies);
            }
        }

        self.relationships = relationships;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_path_is_sentinel() {
        let layer = DomainLayer::invalid_path("Path traversal detected");
        assert!(layer.is_invalid());
        assert_eq!(layer.summary.as_deref(), Some(INVALID_PATH_SUMMARY));
        assert!(layer.components.is_empty());
        assert!(layer.repo_path.is_none());
    }

    #[test]
    fn relationships_follow_co_occurrence() {
        let mut layer = DomainLayer::default();
        layer.components.insert("frontend".into(), "Node.js/JavaScript project".into());
        layer.components.insert("backend".into(), "Python project".into());
        layer.components.insert("database".into(), "Database migrations present".into());
        layer.related_docs.insert("README.md".into(), "/tmp/repos/x/README.md".into());
        layer
            .project_metadata
            .insert("tech_stack".into(), json!(["python", "postgresql"]));

        layer.derive_relationships();

        assert_eq!(layer.relationships["frontend_backend"], vec!["frontend", "backend"]);
        assert_eq!(layer.relationships["backend_database"], vec!["backend", "database"]);
        assert_eq!(layer.relationships["documentation"], vec!["README.md"]);
        assert_eq!(layer.relationships["technologies"], vec!["python", "postgresql"]);
        assert_eq!(layer.relationships["components"].len(), 3);
    }

    #[test]
    fn frontend_alone_has_no_edge() {
        let mut layer = DomainLayer::default();
        layer.components.insert("frontend".into(), "Node.js/JavaScript project".into());
        layer.derive_relationships();
        assert!(!layer.relationships.contains_key("frontend_backend"));
    }
}
