use analysis_core::{AnalysisError, DataProvider, ProviderSnapshot, SourceItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn age(&self) -> chrono::Duration {
        Utc::now() - self.cached_at
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Per-ticker snapshot cache in front of a data provider.
///
/// Starts empty. Reads are concurrent; a miss fetches and overwrites, so two tasks
/// missing the same ticker at once both fetch and the later write wins.
pub struct CachedProvider<P> {
    inner: P,
    entries: DashMap<String, CacheEntry<Arc<ProviderSnapshot>>>,
    ttl: chrono::Duration,
}

impl<P: DataProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl: to_chrono(ttl),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn invalidate(&self, symbol: &str) {
        self.entries.remove(&symbol.to_uppercase());
    }

    /// Evict entries older than `max_age`. Returns how many were removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let max_age = to_chrono(max_age);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.age() <= max_age);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!("Provider cache sweep evicted {} entries", evicted);
        }
        evicted
    }

    fn lookup(&self, key: &str) -> Option<Arc<ProviderSnapshot>> {
        let entry = self.entries.get(key)?;
        (entry.age() < self.ttl).then(|| Arc::clone(&entry.data))
    }
}

impl<P: DataProvider + 'static> CachedProvider<P> {
    /// Periodically sweep on the tokio runtime. The task ends once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.sweep(max_age);
                    }
                    None => break,
                }
            }
        })
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for CachedProvider<P> {
    async fn fetch(&self, symbol: &str) -> Result<Arc<ProviderSnapshot>, AnalysisError> {
        let key = symbol.to_uppercase();
        if let Some(hit) = self.lookup(&key) {
            tracing::debug!("Provider cache hit for {}", key);
            return Ok(hit);
        }

        tracing::debug!("Provider cache miss for {}", key);
        let snapshot = self.inner.fetch(symbol).await?;
        self.entries.insert(
            key,
            CacheEntry {
                data: Arc::clone(&snapshot),
                cached_at: Utc::now(),
            },
        );
        Ok(snapshot)
    }

    fn citation(&self, symbol: &str) -> SourceItem {
        self.inner.citation(symbol)
    }
}
