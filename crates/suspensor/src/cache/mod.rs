mod eviction;
mod normalize;

use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::resource::Resource;

pub use eviction::{EvictionPolicy, LruEviction, NeverEvict};
pub use normalize::{CaseInsensitive, ExactKey, KeyNormalizer};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub total_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

impl CacheMetrics {
    fn record_hit(&mut self) {
        self.cache_hits += 1;
        self.update_hit_rate();
    }

    fn record_miss(&mut self) {
        self.cache_misses += 1;
        self.update_hit_rate();
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_hit_rate(&mut self) {
        let total = self.cache_hits + self.cache_misses;
        if total > 0 {
            self.hit_rate = self.cache_hits as f64 / total as f64;
        }
    }
}

struct CacheState<K, T, E> {
    entries: FxHashMap<K, Resource<T, E>>,
    policy: Box<dyn EvictionPolicy<K>>,
    metrics: CacheMetrics,
}

/// Deduplicates resources by normalized key.
///
/// A key resolves to the same [`Resource`] for as long as the entry lives;
/// with the default [`NeverEvict`] policy that is the life of the cache, and a
/// repeated request never re-runs the operation. Clones share entries, so the
/// cache is handed to consumers rather than kept in a global.
///
/// Factories run while the cache lock is held and must not call back into the
/// same cache.
pub struct ResourceCache<K, T, E> {
    state: Arc<Mutex<CacheState<K, T, E>>>,
    normalizer: Arc<dyn KeyNormalizer<K>>,
    name: Arc<str>,
}

impl<K, T, E> ResourceCache<K, T, E>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
{
    pub fn new(normalizer: impl KeyNormalizer<K> + 'static) -> Self {
        Self::with_policy(normalizer, NeverEvict)
    }

    pub fn with_policy(
        normalizer: impl KeyNormalizer<K> + 'static,
        policy: impl EvictionPolicy<K> + 'static,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: FxHashMap::default(),
                policy: Box::new(policy),
                metrics: CacheMetrics::default(),
            })),
            normalizer: Arc::new(normalizer),
            name: Arc::from("resources"),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn normalize_key(&self, key: impl Into<K>) -> K {
        self.normalizer.normalize(key.into())
    }

    /// Returns the resource cached under `key`, calling `factory` with the
    /// normalized key to build it on a miss.
    pub fn get_or_create<F>(&self, key: impl Into<K>, factory: F) -> Resource<T, E>
    where
        F: FnOnce(&K) -> Resource<T, E>,
    {
        let key = self.normalize_key(key);
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(resource) = state.entries.get(&key) {
            let resource = resource.clone();
            state.policy.record_hit(&key);
            state.metrics.record_hit();
            trace!("Cache {} hit for {:?} -> {}", self.name, key, resource.id());
            return resource;
        }

        let resource = factory(&key);
        state.metrics.record_miss();

        for evicted in state.policy.record_insert(&key) {
            if state.entries.remove(&evicted).is_some() {
                state.metrics.evictions += 1;
                debug!(
                    "Cache {} evicted {:?} under {} policy",
                    self.name,
                    evicted,
                    state.policy.name()
                );
            }
        }

        debug!("Cache {} stored {:?} -> {}", self.name, key, resource.id());
        state.entries.insert(key, resource.clone());
        state.metrics.total_entries = state.entries.len();

        resource
    }

    /// Looks up `key` without creating or touching recency.
    pub fn peek(&self, key: impl Into<K>) -> Option<Resource<T, E>> {
        let key = self.normalize_key(key);
        self.state.lock().entries.get(&key).cloned()
    }

    pub fn contains(&self, key: impl Into<K>) -> bool {
        let key = self.normalize_key(key);
        self.state.lock().entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.state.lock().entries.keys().cloned().collect()
    }

    pub fn policy_name(&self) -> &'static str {
        self.state.lock().policy.name()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }
}

impl<T, E> ResourceCache<String, T, E> {
    pub fn from_config(config: &CacheConfig) -> Self {
        let normalizer: Arc<dyn KeyNormalizer<String>> = if config.case_insensitive_keys {
            Arc::new(CaseInsensitive)
        } else {
            Arc::new(ExactKey)
        };

        let policy: Box<dyn EvictionPolicy<String>> =
            match config.max_entries.and_then(NonZeroUsize::new) {
                Some(capacity) => Box::new(LruEviction::new(capacity)),
                None => Box::new(NeverEvict),
            };

        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: FxHashMap::default(),
                policy,
                metrics: CacheMetrics::default(),
            })),
            normalizer,
            name: Arc::from("resources"),
        }
    }
}

impl<K, T, E> Clone for ResourceCache<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            normalizer: Arc::clone(&self.normalizer),
            name: Arc::clone(&self.name),
        }
    }
}
