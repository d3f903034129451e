//! Keyed cache with a per-entry time to live

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

#[async_trait]
pub trait TtlCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V>;

    /// Store `value`, replacing any previous entry and its lifetime
    async fn set(&self, key: &str, value: V, ttl: Duration);

    async fn invalidate(&self, key: &str);
}

#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: Duration,
}

struct EntryExpiry;

impl<V> Expiry<String, Entry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process [`TtlCache`] backed by moka
pub struct MokaTtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, Entry<V>>,
}

impl<V> MokaTtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();
        Self { inner }
    }
}

#[async_trait]
impl<V> TtlCache<V> for MokaTtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) {
        self.inner.insert(key.to_string(), Entry { value, ttl }).await;
    }

    async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MokaTtlCache::new(16);
        cache.set("stats", 42u64, Duration::from_secs(60)).await;
        assert_eq!(cache.get("stats").await, Some(42));
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MokaTtlCache::new(16);
        cache.set("short", 1u64, Duration::from_millis(50)).await;
        cache.set("long", 2u64, Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("long").await, Some(2));
    }

    #[tokio::test]
    async fn test_invalidate_and_overwrite() {
        let cache = MokaTtlCache::new(16);
        cache.set("k", "a".to_string(), Duration::from_secs(60)).await;
        cache.set("k", "b".to_string(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("b"));

        cache.invalidate("k").await;
        assert_eq!(cache.get("k").await, None);
    }
}
