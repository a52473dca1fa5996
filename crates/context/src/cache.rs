//! TTL caches for the lookup collaborators.
//!
//! [`CachedHistoryLookup`] and [`CachedDomainAnalyzer`] wrap an inner
//! collaborator and implement the same trait, so the builder never knows a
//! cache is present. Only successful lookups are cached; errors always
//! reach the caller. When full, expired entries are purged first, then the
//! oldest entry is evicted. With `cache_enabled = false` every lookup goes
//! straight to the inner collaborator.

use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strata_config::{ContextConfig, SourceSettings};
use strata_core::{
    DomainAnalysis, DomainAnalyzer, HistoryLookup, HistoryRecord, SourceError,
};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (Instant, V)>>,
    ttl: Duration,
    max_size: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_size,
        }
    }

    async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    async fn insert(&self, key: K, value: V) {
        if self.max_size == 0 || self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        }
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (stored, _))| *stored)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, (Instant::now(), value));
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Capacity from config; zero when caching is switched off.
fn effective_max_size(context: &ContextConfig) -> usize {
    if context.cache_enabled {
        context.cache_max_size
    } else {
        0
    }
}

/// Effective TTL: the source's own TTL when set, else the aggregate one.
fn effective_ttl(source: &SourceSettings, context: &ContextConfig) -> Duration {
    let seconds = if source.cache_ttl_seconds > 0 {
        source.cache_ttl_seconds
    } else {
        context.cache_ttl_seconds
    };
    Duration::from_secs(seconds)
}

// ── History ───────────────────────────────────────────────────────────────

pub struct CachedHistoryLookup {
    inner: Arc<dyn HistoryLookup>,
    cache: TtlCache<String, Option<HistoryRecord>>,
}

impl CachedHistoryLookup {
    pub fn new(inner: Arc<dyn HistoryLookup>, ttl: Duration, max_size: usize) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, max_size),
        }
    }

    /// Sized from `context.cache_max_size` and the identity source TTL.
    pub fn from_config(inner: Arc<dyn HistoryLookup>, context: &ContextConfig) -> Self {
        Self::new(
            inner,
            effective_ttl(&context.sources.identity, context),
            effective_max_size(context),
        )
    }

    pub async fn len(&self) -> usize {
        self.cache.len().await
    }
}

#[async_trait]
impl HistoryLookup for CachedHistoryLookup {
    async fn lookup(&self, user_id: &str) -> Result<Option<HistoryRecord>, SourceError> {
        let key = user_id.to_string();
        if let Some(hit) = self.cache.get(&key).await {
            debug!(cache = "history", "Cache hit");
            return Ok(hit);
        }
        let record = self.inner.lookup(user_id).await?;
        self.cache.insert(key, record.clone()).await;
        Ok(record)
    }
}

// ── Domain ────────────────────────────────────────────────────────────────

pub struct CachedDomainAnalyzer {
    inner: Arc<dyn DomainAnalyzer>,
    cache: TtlCache<PathBuf, Option<DomainAnalysis>>,
}

impl CachedDomainAnalyzer {
    pub fn new(inner: Arc<dyn DomainAnalyzer>, ttl: Duration, max_size: usize) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, max_size),
        }
    }

    /// Sized from `context.cache_max_size` and the domain source TTL.
    pub fn from_config(inner: Arc<dyn DomainAnalyzer>, context: &ContextConfig) -> Self {
        Self::new(
            inner,
            effective_ttl(&context.sources.domain, context),
            effective_max_size(context),
        )
    }

    pub async fn len(&self) -> usize {
        self.cache.len().await
    }
}

#[async_trait]
impl DomainAnalyzer for CachedDomainAnalyzer {
    async fn analyze(&self, path: &Path) -> Result<Option<DomainAnalysis>, SourceError> {
        let key = path.to_path_buf();
        if let Some(hit) = self.cache.get(&key).await {
            debug!(cache = "domain", "Cache hit");
            return Ok(hit);
        }
        let analysis = self.inner.analyze(path).await?;
        self.cache.insert(key, analysis.clone()).await;
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingHistory {
        calls: Mutex<usize>,
        fail: bool,
    }

    impl CountingHistory {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl HistoryLookup for CountingHistory {
        async fn lookup(&self, user_id: &str) -> Result<Option<HistoryRecord>, SourceError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(SourceError::Unavailable("store offline".into()));
            }
            Ok(Some(HistoryRecord {
                summary: Some(format!("history of {user_id}")),
                session_count: 3,
                last_seen: None,
            }))
        }
    }

    struct CountingAnalyzer(Mutex<usize>);

    #[async_trait]
    impl DomainAnalyzer for CountingAnalyzer {
        async fn analyze(&self, _path: &Path) -> Result<Option<DomainAnalysis>, SourceError> {
            *self.0.lock().unwrap() += 1;
            Ok(Some(DomainAnalysis::default()))
        }
    }

    #[tokio::test]
    async fn repeated_lookup_hits_cache() {
        let inner = CountingHistory::new(false);
        let cached = CachedHistoryLookup::new(inner.clone(), Duration::from_secs(60), 10);

        let first = cached.lookup("u-1").await.unwrap();
        let second = cached.lookup("u-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let inner = CountingHistory::new(true);
        let cached = CachedHistoryLookup::new(inner.clone(), Duration::from_secs(60), 10);

        assert!(cached.lookup("u-1").await.is_err());
        assert!(cached.lookup("u-1").await.is_err());
        assert_eq!(inner.calls(), 2);
        assert_eq!(cached.len().await, 0);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let inner = CountingHistory::new(false);
        let cached = CachedHistoryLookup::new(inner.clone(), Duration::from_millis(10), 10);

        cached.lookup("u-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cached.lookup("u-1").await.unwrap();
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn max_size_evicts_oldest() {
        let inner = CountingHistory::new(false);
        let cached = CachedHistoryLookup::new(inner.clone(), Duration::from_secs(60), 2);

        cached.lookup("a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        cached.lookup("b").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        cached.lookup("c").await.unwrap();
        assert_eq!(cached.len().await, 2);

        // "a" was evicted, "c" is still cached.
        cached.lookup("c").await.unwrap();
        assert_eq!(inner.calls(), 3);
        cached.lookup("a").await.unwrap();
        assert_eq!(inner.calls(), 4);
    }

    #[tokio::test]
    async fn disabled_cache_always_reaches_collaborator() {
        let context = ContextConfig {
            cache_enabled: false,
            ..ContextConfig::default()
        };

        let history = CountingHistory::new(false);
        let cached = CachedHistoryLookup::from_config(history.clone(), &context);
        cached.lookup("u-1").await.unwrap();
        cached.lookup("u-1").await.unwrap();
        cached.lookup("u-1").await.unwrap();
        assert_eq!(history.calls(), 3);
        assert_eq!(cached.len().await, 0);

        let analyzer = Arc::new(CountingAnalyzer(Mutex::new(0)));
        let cached = CachedDomainAnalyzer::from_config(analyzer.clone(), &context);
        cached.analyze(Path::new("/tmp/repos/a")).await.unwrap();
        cached.analyze(Path::new("/tmp/repos/a")).await.unwrap();
        assert_eq!(*analyzer.0.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn analyzer_cache_keys_by_path() {
        let inner = Arc::new(CountingAnalyzer(Mutex::new(0)));
        let cached = CachedDomainAnalyzer::from_config(inner.clone(), &ContextConfig::default());

        cached.analyze(Path::new("/tmp/repos/a")).await.unwrap();
        cached.analyze(Path::new("/tmp/repos/a")).await.unwrap();
        cached.analyze(Path::new("/tmp/repos/b")).await.unwrap();
        assert_eq!(*inner.0.lock().unwrap(), 2);
    }
}
