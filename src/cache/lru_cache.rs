use dashmap::DashMap;
use std::{
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

/// Cache entry con TTL
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
    last_used: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// LRU cache with optional per-entry TTL.
///
/// Capacity is enforced on insert by evicting the least recently read entry.
/// Expired entries are dropped lazily on `get` and in bulk by
/// [`LRUCache::cleanup_expired`].
#[derive(Debug)]
pub struct LRUCache<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, CacheEntry<V>>>,
    capacity: usize,
    clock: Arc<AtomicU64>,
    stats: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
}

impl<K, V> LRUCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
            clock: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(Counters::default()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) -> Option<V> {
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
            last_used: self.tick(),
        };
        let previous = self.data.insert(key, entry).map(|old| old.value);

        while self.data.len() > self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }
        previous
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let expired = match self.data.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.last_used = self.tick();
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.data.remove_if(key, |_, entry| entry.is_expired(now));
            self.stats.expired_removals.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.data.len());

        if removed > 0 {
            self.stats
                .expired_removals
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Limpiadas {} entradas expiradas del cache", removed);
        }

        removed
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expired_removals: self.stats.expired_removals.load(Ordering::Relaxed),
        }
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .data
            .iter()
            .min_by_key(|entry| entry.value().last_used)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                self.data.remove(&key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl<K, V> Clone for LRUCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            capacity: self.capacity,
            clock: self.clock.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Métricas básicas del cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
