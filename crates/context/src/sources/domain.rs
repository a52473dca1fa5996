//! Domain source — confinement first, then analysis.
//!
//! Nothing on the filesystem is touched until [`confine_repo_path`] accepts
//! the path. Without an injected analyzer, a fixed list of marker files
//! and directories is probed directly under the repository root.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use strata_config::{SecurityConfig, SourceSettings};
use strata_core::{
    DegradeReason, DomainAnalysis, DomainAnalyzer, DomainLayer, DomainState, SourceError, Sourced,
};
use strata_security::confine_repo_path;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Raw domain inputs from the request.
#[derive(Debug, Clone, Default)]
pub struct DomainInput<'a> {
    pub repository_path: Option<&'a str>,
    pub project_id: Option<&'a str>,
    pub metadata: Option<&'a Map<String, Value>>,
}

/// (marker, component, description)
const COMPONENT_MARKERS: &[(&str, &str, &str)] = &[
    ("package.json", "frontend", "Node.js/JavaScript project"),
    ("requirements.txt", "backend", "Python project"),
    ("pyproject.toml", "backend", "Python project"),
    ("Cargo.toml", "backend", "Rust project"),
    ("Dockerfile", "containerization", "Docker support"),
    ("docker-compose.yml", "orchestration", "Docker Compose setup"),
    ("migrations", "database", "Database migrations present"),
    ("alembic", "database", "Database migrations present"),
];

const TEST_DIRS: &[&str] = &["tests", "test", "__tests__", "spec"];
const DOC_MARKERS: &[&str] = &["README.md", "docs/", "documentation/"];

pub async fn build_domain(
    input: DomainInput<'_>,
    analyzer: Option<&dyn DomainAnalyzer>,
    security: &SecurityConfig,
    settings: &SourceSettings,
) -> Sourced<DomainLayer> {
    let mut result = match input.repository_path {
        Some(raw) => analyze_path(raw, analyzer, security, settings).await,
        None => Sourced::Fresh(DomainLayer::default()),
    };

    let layer = match &mut result {
        Sourced::Fresh(layer) | Sourced::Degraded { value: layer, .. } => layer,
    };
    if layer.is_invalid() {
        return result;
    }
    if let Some(project_id) = input.project_id {
        layer
            .project_metadata
            .insert("project_id".into(), Value::from(project_id));
    }
    if let Some(metadata) = input.metadata {
        for (key, value) in metadata {
            layer.project_metadata.insert(key.clone(), value.clone());
        }
    }
    layer.derive_relationships();

    result
}

async fn analyze_path(
    raw: &str,
    analyzer: Option<&dyn DomainAnalyzer>,
    security: &SecurityConfig,
    settings: &SourceSettings,
) -> Sourced<DomainLayer> {
    let resolved = match confine_repo_path(raw, security) {
        Ok(path) => path,
        Err(e) => {
            warn!(layer = "domain", reason = %e.reason(), "Repository path rejected");
            return Sourced::degraded(
                DomainLayer::invalid_path(e.reason()),
                DegradeReason::InvalidInput { message: e.reason() },
            );
        }
    };

    let mut layer = DomainLayer {
        repo_path: Some(resolved.to_string_lossy().into_owned()),
        ..DomainLayer::default()
    };

    if !tokio::fs::try_exists(&resolved).await.unwrap_or(false) {
        debug!(path = %resolved.display(), "Repository path does not exist, skipping analysis");
        layer.state = DomainState::NotFound;
        return Sourced::Fresh(layer);
    }

    let analysis = match analyzer {
        Some(analyzer) => analyze_with_deadline(analyzer, &resolved, settings).await,
        None => Ok(Some(scan_markers(&resolved).await)),
    };

    match analysis {
        Ok(Some(analysis)) => {
            layer.state = DomainState::Analyzed;
            layer.summary = analysis.summary;
            layer.components = analysis.components;
            layer.related_docs = analysis.related_docs;
            layer.project_metadata = analysis.project_metadata;
            Sourced::Fresh(layer)
        }
        Ok(None) => {
            layer.state = DomainState::Analyzed;
            Sourced::Fresh(layer)
        }
        Err(e) => {
            warn!(layer = "domain", "Repository analysis failed");
            layer.state = DomainState::AnalysisFailed;
            layer.summary = Some("Repository analysis failed".into());
            let reason = match e {
                SourceError::Timeout { timeout_ms } => DegradeReason::TimedOut { timeout_ms },
                other => DegradeReason::SourceFailed {
                    message: other.to_string(),
                },
            };
            Sourced::degraded(layer, reason)
        }
    }
}

async fn analyze_with_deadline(
    analyzer: &dyn DomainAnalyzer,
    path: &Path,
    settings: &SourceSettings,
) -> Result<Option<DomainAnalysis>, SourceError> {
    let deadline = Instant::now() + Duration::from_millis(settings.timeout_ms);
    let mut last_error = SourceError::Timeout {
        timeout_ms: settings.timeout_ms,
    };

    for attempt in 1..=settings.retry_attempts + 1 {
        match tokio::time::timeout_at(deadline, analyzer.analyze(path)).await {
            Ok(Ok(analysis)) => return Ok(analysis),
            Ok(Err(e)) => {
                debug!(attempt, "Domain analysis attempt failed");
                last_error = e;
            }
            Err(_) => {
                return Err(SourceError::Timeout {
                    timeout_ms: settings.timeout_ms,
                });
            }
        }
    }

    Err(last_error)
}

async fn exists(root: &Path, name: &str) -> bool {
    tokio::fs::try_exists(root.join(name.trim_end_matches('/')))
        .await
        .unwrap_or(false)
}

/// Probe the fixed marker list directly under `root`.
pub async fn scan_markers(root: &Path) -> DomainAnalysis {
    let mut components = BTreeMap::new();

    for (marker, component, description) in COMPONENT_MARKERS {
        if !components.contains_key(*component) && exists(root, marker).await {
            components.insert(component.to_string(), description.to_string());
        }
    }

    for dir in TEST_DIRS {
        if exists(root, dir).await {
            components.insert("testing".to_string(), format!("Test suite in {dir}/"));
            break;
        }
    }

    let mut related_docs = BTreeMap::new();
    for doc in DOC_MARKERS {
        if exists(root, doc).await {
            related_docs.insert(
                doc.to_string(),
                root.join(doc.trim_end_matches('/')).to_string_lossy().into_owned(),
            );
        }
    }
    if !related_docs.is_empty() {
        components.insert("documentation".to_string(), "Project documentation".to_string());
    }

    let names: Vec<&str> = components.keys().map(String::as_str).collect();
    let summary = if names.is_empty() {
        "Repository with no recognized components".to_string()
    } else {
        format!("Repository with components: {}", names.join(", "))
    };

    DomainAnalysis {
        summary: Some(summary),
        components,
        related_docs,
        project_metadata: Map::new(),
    }
}
