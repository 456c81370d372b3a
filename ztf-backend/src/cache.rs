///! In-memory memoization for remote query results
///!
///! Every network-facing service owns one or more [`QueryCache`]s keyed by
///! explicit value types (rounded coordinates, sorted parameter sets). Two
///! concurrent first requests for the same key may both hit the remote —
///! results are idempotent, so the cache only guarantees "eventually cached",
///! not "at most once". Entries live until the optional TTL expires, or for
///! the process lifetime without one.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub struct QueryCache<K, V> {
    ttl: Option<Duration>,
    entries: RwLock<HashMap<K, (Instant, V)>>,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Clone of the cached value, if present and fresh.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let (inserted_at, value) = entries.get(key)?;
        if let Some(ttl) = self.ttl {
            if inserted_at.elapsed() > ttl {
                return None;
            }
        }
        Some(value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        self.entries.write().await.insert(key, (Instant::now(), value));
    }

    /// Return the cached value for `key`, or run `fetch` and cache its
    /// result. The lock is not held across `fetch`, so a concurrent miss on
    /// the same key fetches again rather than blocking.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key).await {
            return value;
        }
        let value = fetch().await;
        self.insert(key, value.clone()).await;
        value
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache: QueryCache<u32, String> = QueryCache::new(None);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(7, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "payload".to_string()
                })
                .await;
            assert_eq!(value, "payload");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let cache: QueryCache<(u32, u32), u32> = QueryCache::new(None);
        let calls = AtomicUsize::new(0);

        for key in [(1, 2), (2, 1), (1, 2)] {
            cache
                .get_or_fetch(key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    key.0 + key.1
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mutating_a_returned_value_does_not_poison_the_cache() {
        let cache: QueryCache<u8, Vec<u32>> = QueryCache::new(None);
        cache.insert(1, vec![10, 20]).await;

        let mut first = cache.get(&1).await.unwrap();
        first.push(30);

        assert_eq!(cache.get(&1).await.unwrap(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache: QueryCache<u8, u8> = QueryCache::new(Some(Duration::from_millis(10)));
        cache.insert(1, 42).await;
        assert_eq!(cache.get(&1).await, Some(42));

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(&1).await, None);
    }

    #[tokio::test]
    async fn test_without_ttl_entries_persist() {
        let cache: QueryCache<u8, u8> = QueryCache::new(None);
        cache.insert(1, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get(&1).await, Some(1));
    }
}
