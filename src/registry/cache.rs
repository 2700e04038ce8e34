//! In-memory caching layer for registry lookups.

use crate::types::{PackageKey, RegistryStatus};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache entry with TTL.
#[derive(Debug, Clone)]
struct CacheEntry {
    status: RegistryStatus,
    expires_at: Instant,
}

/// Thread-safe cache for registry existence results, keyed by
/// (ecosystem, name).
#[derive(Debug, Clone)]
pub struct RegistryCache {
    cache: Arc<DashMap<PackageKey, CacheEntry>>,
    ttl: Duration,
}

impl RegistryCache {
    /// Create a new cache with the given TTL in seconds.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Get a cached status if it exists and hasn't expired.
    pub fn get(&self, key: &PackageKey) -> Option<RegistryStatus> {
        let entry = self.cache.get(key)?;
        if Instant::now() < entry.expires_at {
            return Some(entry.status.clone());
        }
        // Entry expired, remove it
        drop(entry);
        self.cache.remove(key);
        None
    }

    /// Store a status in the cache.
    pub fn set(&self, key: &PackageKey, status: RegistryStatus) {
        let entry = CacheEntry {
            status,
            expires_at: Instant::now() + self.ttl,
        };
        self.cache.insert(key.clone(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ecosystem;

    #[test]
    fn test_cache_set_get() {
        let cache = RegistryCache::new(60);
        let key = PackageKey::new(Ecosystem::Npm, "left-pad");

        cache.set(
            &key,
            RegistryStatus::Exists {
                latest_version: Some("1.3.0".to_string()),
            },
        );

        match cache.get(&key) {
            Some(RegistryStatus::Exists { latest_version }) => {
                assert_eq!(latest_version.as_deref(), Some("1.3.0"));
            }
            other => panic!("expected Exists, got {:?}", other),
        }
    }

    #[test]
    fn test_cache_miss() {
        let cache = RegistryCache::new(60);
        assert!(cache
            .get(&PackageKey::new(Ecosystem::Pypi, "nonexistent"))
            .is_none());
    }

    #[test]
    fn test_same_name_in_two_ecosystems_is_two_entries() {
        let cache = RegistryCache::new(60);
        cache.set(
            &PackageKey::new(Ecosystem::Npm, "requests"),
            RegistryStatus::NotFound,
        );

        assert!(cache
            .get(&PackageKey::new(Ecosystem::Pypi, "requests"))
            .is_none());
    }
}
