//! # Cache Module
//!
//! Bounded metadata cache shared by every session's preloader.
//!
//! Entries are keyed by the track's page URL and hold the resolved
//! [`TrackInfo`]. Stream URLs handed out by the resolver expire, so every
//! entry carries a TTL (`METADATA_TTL`, one hour by default) and the cache
//! never grows past `METADATA_CACHE_SIZE` entries.

pub mod lru_cache;

use lru_cache::LRUCache;
use std::time::Duration;
use tracing::info;

use crate::sources::TrackInfo;

pub use lru_cache::CacheMetrics;

/// Cache de metadata resuelta, indexada por URL de la página
#[derive(Debug, Clone)]
pub struct MetadataCache {
    entries: LRUCache<String, TrackInfo>,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: LRUCache::new(capacity),
            ttl,
        }
    }

    pub fn get(&self, url: &str) -> Option<TrackInfo> {
        self.entries.get(&url.to_string())
    }

    /// Solo se guardan resoluciones completas
    pub fn put(&self, url: impl Into<String>, info: TrackInfo) {
        if info.is_resolved() {
            self.entries.insert_with_ttl(url.into(), info, Some(self.ttl));
        }
    }

    pub fn invalidate(&self, url: &str) {
        self.entries.remove(&url.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.entries.metrics()
    }

    /// Performs cache maintenance by removing expired entries.
    pub fn cleanup_old_entries(&self) {
        let removed = self.entries.cleanup_expired();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resolved_info_is_cached() {
        let cache = MetadataCache::new(10, Duration::from_secs(60));
        cache.put("https://page/a", TrackInfo::default());
        assert!(cache.is_empty());

        cache.put(
            "https://page/b",
            TrackInfo {
                source_url: Some("https://cdn/b".to_string()),
                ..TrackInfo::default()
            },
        );
        assert_eq!(cache.len(), 1);
        assert!(cache.get("https://page/b").is_some());

        cache.invalidate("https://page/b");
        assert!(cache.get("https://page/b").is_none());
    }
}
