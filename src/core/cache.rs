use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// In-memory cache with optional per-entry expiry.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().await;
        let expired = match cache.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|expiry| expiry <= Instant::now()),
            None => {
                debug!("Cache MISS for key: {:?}", key);
                return None;
            }
        };
        if expired {
            debug!("Cache entry expired for key: {:?}", key);
            cache.remove(key);
            return None;
        }
        debug!("Cache HIT for key: {:?}", key);
        cache.get(key).map(|entry| entry.value.clone())
    }

    pub async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, CacheValue { value, expires_at });
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
