//! Repository path confinement.
//!
//! A caller-supplied repository path is only ever resolved inside the
//! configured base directory. Lexical checks run first so a rejected path
//! never touches the filesystem; symlinks are resolved afterwards and must
//! still land inside the canonical base.

use std::path::{Component, Path, PathBuf};
use strata_config::SecurityConfig;

/// Error returned when path confinement fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Empty path")]
    Empty,

    #[error("Path too long ({len} > {max})")]
    TooLong { len: usize, max: usize },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Absolute path '{path}' not allowed")]
    AbsolutePath { path: String },

    #[error("Path '{path}' matches blocked pattern '{pattern}'")]
    BlockedPattern { path: String, pattern: String },

    #[error("Path '{path}' resolves outside the repository base directory")]
    OutsideBaseDir { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

impl PathValidationError {
    /// Short reason without the offending path, safe to echo back.
    pub fn reason(&self) -> String {
        match self {
            PathValidationError::Empty => "Empty path".into(),
            PathValidationError::TooLong { .. } => "Path too long".into(),
            PathValidationError::PathTraversal { .. } => "Path traversal detected".into(),
            PathValidationError::AbsolutePath { .. } => "Absolute path not allowed".into(),
            PathValidationError::BlockedPattern { pattern, .. } => {
                format!("Blocked pattern: {pattern}")
            }
            PathValidationError::OutsideBaseDir { .. } => "Path escapes base directory".into(),
            PathValidationError::CanonicalizeFailed { .. } => "Path could not be resolved".into(),
        }
    }
}

/// Resolve `path` strictly inside `policy.allowed_repo_base_dir`.
///
/// Checks, in order:
/// 1. Non-empty and within the length limit
/// 2. No `..` sequence anywhere in the raw or normalized path
/// 3. Not absolute (leading separator or drive prefix)
/// 4. No blocked pattern
/// 5. After joining to the base and resolving symlinks, still under the base
///
/// Returns the resolved path on success.
pub fn confine_repo_path(path: &str, policy: &SecurityConfig) -> Result<PathBuf, PathValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(PathValidationError::Empty);
    }

    let len = trimmed.chars().count();
    if len > policy.max_repo_path_length {
        return Err(PathValidationError::TooLong {
            len,
            max: policy.max_repo_path_length,
        });
    }

    let normalized = trimmed.replace('\\', "/");
    if normalized.contains("..") {
        return Err(PathValidationError::PathTraversal { path: path.into() });
    }

    if is_absolute(&normalized) {
        return Err(PathValidationError::AbsolutePath { path: path.into() });
    }

    if let Some(pattern) = blocked_pattern(&normalized, &policy.blocked_path_patterns) {
        return Err(PathValidationError::BlockedPattern {
            path: path.into(),
            pattern: pattern.to_string(),
        });
    }

    let relative = lexical_normalize(Path::new(&normalized));
    let base = resolve_existing_prefix(&policy.allowed_repo_base_dir, path)?;
    let candidate = base.join(&relative);
    let resolved = resolve_existing_prefix(&candidate, path)?;

    if !resolved.starts_with(&base) {
        return Err(PathValidationError::OutsideBaseDir { path: path.into() });
    }

    Ok(resolved)
}

fn is_absolute(normalized: &str) -> bool {
    if normalized.starts_with('/') || Path::new(normalized).has_root() {
        return true;
    }
    // Drive prefix (`C:`), regardless of host platform.
    let mut chars = normalized.chars();
    matches!((chars.next(), chars.next()), (Some(c), Some(':')) if c.is_ascii_alphabetic())
}

/// First blocked pattern matching `normalized`.
///
/// Patterns containing `*` are matched against each path component as a
/// prefix/suffix glob; all others are plain substrings.
fn blocked_pattern<'a>(normalized: &str, patterns: &'a [String]) -> Option<&'a str> {
    let components: Vec<&str> = normalized.split('/').filter(|c| !c.is_empty()).collect();

    patterns.iter().map(String::as_str).find(|pattern| {
        match pattern.split_once('*') {
            Some((prefix, suffix)) => components
                .iter()
                .any(|c| c.len() >= prefix.len() + suffix.len() && c.starts_with(prefix) && c.ends_with(suffix)),
            None => normalized.contains(pattern),
        }
    })
}

/// Drop `.` components; `..` has already been rejected.
fn lexical_normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the rest.
///
/// Used for both the base and the candidate, so a symlinked ancestor of a
/// missing base resolves the same way on both sides.
fn resolve_existing_prefix(path: &Path, original: &str) -> Result<PathBuf, PathValidationError> {
    let mut existing = path;
    let mut rest = Vec::new();

    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(path.to_path_buf()),
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| PathValidationError::CanonicalizeFailed {
            path: original.into(),
            reason: e.to_string(),
        })?;
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_at(base: &Path) -> SecurityConfig {
        SecurityConfig {
            allowed_repo_base_dir: base.to_path_buf(),
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn relative_path_confined_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("project")).unwrap();
        let resolved = confine_repo_path("project", &policy_at(dir.path())).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("project"));
    }

    #[test]
    fn missing_target_still_resolves_under_base() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = confine_repo_path("./team/app", &policy_at(dir.path())).unwrap();
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
        assert!(resolved.ends_with("team/app"));
    }

    #[test]
    fn empty_rejected() {
        let policy = SecurityConfig::default();
        assert!(matches!(confine_repo_path("   ", &policy), Err(PathValidationError::Empty)));
    }

    #[test]
    fn over_length_rejected() {
        let policy = SecurityConfig::default();
        let long = "a".repeat(policy.max_repo_path_length + 1);
        assert!(matches!(
            confine_repo_path(&long, &policy),
            Err(PathValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn traversal_rejected() {
        let policy = SecurityConfig::default();
        for path in ["../../etc", "project/../../etc", "..\\windows", "a/.."] {
            match confine_repo_path(path, &policy) {
                Err(PathValidationError::PathTraversal { .. }) => {}
                other => panic!("Expected PathTraversal for {path}, got: {other:?}"),
            }
        }
    }

    #[test]
    fn absolute_rejected() {
        let policy = SecurityConfig::default();
        for path in ["/etc/passwd", "\\\\server\\share", "C:\\Users", "c:/repo"] {
            match confine_repo_path(path, &policy) {
                Err(PathValidationError::AbsolutePath { .. }) => {}
                other => panic!("Expected AbsolutePath for {path}, got: {other:?}"),
            }
        }
    }

    #[test]
    fn blocked_patterns_rejected() {
        let policy = SecurityConfig::default();
        let cases = [
            ("project/.env", ".env"),
            ("project/.git/config", ".git/"),
            ("keys/server.pem", "*.pem"),
            ("app/node_modules/x", "node_modules/"),
        ];
        for (path, expected) in cases {
            match confine_repo_path(path, &policy) {
                Err(PathValidationError::BlockedPattern { pattern, .. }) => {
                    assert_eq!(pattern, expected, "{path}");
                }
                other => panic!("Expected BlockedPattern for {path}, got: {other:?}"),
            }
        }
    }

    #[test]
    fn reason_omits_path() {
        let err = PathValidationError::PathTraversal {
            path: "../../etc".into(),
        };
        assert_eq!(err.reason(), "Path traversal detected");
        assert!(err.to_string().contains("../../etc"));
    }

    #[cfg(unix)]
    #[test]
    fn missing_base_under_symlinked_ancestor() {
        let real = tempfile::tempdir().unwrap();
        let links = tempfile::tempdir().unwrap();
        let link = links.path().join("tmp");
        std::os::unix::fs::symlink(real.path(), &link).unwrap();

        let resolved = confine_repo_path("team/app", &policy_at(&link.join("repos"))).unwrap();
        let expected = real.path().canonicalize().unwrap().join("repos/team/app");
        assert_eq!(resolved, expected);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let base = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), base.path().join("escape")).unwrap();

        match confine_repo_path("escape", &policy_at(base.path())) {
            Err(PathValidationError::OutsideBaseDir { .. }) => {}
            other => panic!("Expected OutsideBaseDir, got: {other:?}"),
        }
    }
}
