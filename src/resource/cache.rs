//! Caching policy for resource series.
//!
//! The planner only depends on the [`ResourceCache`] trait; the transport
//! behind it is somebody else's concern. Any backend error is treated as a
//! miss by the caller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::request::{Coordinates, DateRange};

/// Key under which a series is stored.
pub fn cache_key(coordinates: &Coordinates, range: &DateRange) -> String {
    format!(
        "renewables:{}:{}:{}:{}",
        coordinates.latitude, coordinates.longitude, range.start_date, range.end_date
    )
}

/// Key-value store with per-entry expiry.
pub trait ResourceCache: Send + Sync {
    /// Returns the value for `key`, or `None` on miss or expiry.
    ///
    /// # Errors
    ///
    /// Returns a `CacheError` when the backend cannot be reached.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns a `CacheError` when the backend cannot be reached.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// A cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ResourceCache for NoopCache {
    fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Process-local cache with lazy expiry.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let fresh = entries
            .get(key)
            .filter(|(expires, _)| *expires > Instant::now())
            .map(|(_, value)| value.clone());
        if fresh.is_none() {
            entries.remove(key);
        }
        Ok(fresh)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), (Instant::now() + ttl, value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_follows_documented_layout() {
        let key = cache_key(
            &Coordinates {
                latitude: 37.77,
                longitude: -122.42,
            },
            &DateRange::calendar_year(2023).unwrap(),
        );
        assert_eq!(key, "renewables:37.77:-122.42:2023-01-01:2023-12-31");
    }

    #[test]
    fn noop_cache_always_misses() {
        let cache = NoopCache;
        cache.set("k", "v", Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn in_memory_cache_round_trips_until_expiry() {
        let cache = InMemoryCache::new();
        cache.set("live", "v1", Duration::from_secs(3600)).unwrap();
        cache.set("dead", "v2", Duration::ZERO).unwrap();
        assert_eq!(cache.get("live").unwrap().as_deref(), Some("v1"));
        assert_eq!(cache.get("dead").unwrap(), None);
        assert_eq!(cache.len(), 1);
    }
}
