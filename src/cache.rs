use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct Cache<K, V> {
    inner: LruCache<K, V>,
}

impl<K: std::hash::Hash + Eq, V> Cache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Cache {
            inner: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

struct CachedPage {
    html: String,
    stored_at: Instant,
}

/// Cache for rendered index pages, keyed by path + query string. Entries
/// expire after a fixed TTL or when `clear` is called; nothing on the write
/// path invalidates them, so a just-deleted post can linger until expiry.
pub struct PageCache {
    entries: Mutex<Cache<String, CachedPage>>,
    ttl: Duration,
}

impl PageCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(Cache::new(capacity)),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(&key.to_string()) {
            Some(page) if page.stored_at.elapsed() < self.ttl => Some(page.html.clone()),
            Some(_) => {
                entries.remove(&key.to_string());
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: String, html: String) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            CachedPage {
                html,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
