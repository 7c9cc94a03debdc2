use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Decides which entries leave the cache.
pub trait EvictionPolicy<K>: Send {
    /// Called before `key` is inserted. Returns the keys to drop.
    fn record_insert(&mut self, key: &K) -> Vec<K>;

    fn record_hit(&mut self, key: &K);

    fn name(&self) -> &'static str;
}

/// Keeps every entry for the life of the cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEvict;

impl<K> EvictionPolicy<K> for NeverEvict {
    fn record_insert(&mut self, _key: &K) -> Vec<K> {
        Vec::new()
    }

    fn record_hit(&mut self, _key: &K) {}

    fn name(&self) -> &'static str {
        "never"
    }
}

/// Bounds the cache to `capacity` entries, dropping the least recently used.
pub struct LruEviction<K: Hash + Eq> {
    order: LruCache<K, ()>,
}

impl<K: Hash + Eq> LruEviction<K> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self { order: LruCache::new(capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.order.cap().get()
    }
}

impl<K> EvictionPolicy<K> for LruEviction<K>
where
    K: Hash + Eq + Clone + Send,
{
    fn record_insert(&mut self, key: &K) -> Vec<K> {
        match self.order.push(key.clone(), ()) {
            Some((evicted, ())) if evicted != *key => vec![evicted],
            _ => Vec::new(),
        }
    }

    fn record_hit(&mut self, key: &K) {
        self.order.promote(key);
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}
