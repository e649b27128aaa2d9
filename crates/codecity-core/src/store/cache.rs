//! Injectable cache of finished city models.
//!
//! The analyzer never holds results itself; callers hand it a [`CityCache`]
//! with an explicit [`CachePolicy`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::CityResult;
use crate::models::CityModel;

pub const DEFAULT_CACHE_ENTRIES: usize = 32;

/// Capacity and expiry applied by every cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub max_entries: usize,
    /// Entries older than this are treated as absent. `None` never expires.
    pub ttl: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_ENTRIES,
            ttl: None,
        }
    }
}

impl CachePolicy {
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ttl,
        }
    }
}

/// Key -> CityModel store.
pub trait CityCache: Send + Sync {
    fn get(&self, key: &str) -> CityResult<Option<Arc<CityModel>>>;
    fn put(&self, key: &str, model: Arc<CityModel>) -> CityResult<()>;
    /// Returns whether an entry was removed.
    fn remove(&self, key: &str) -> CityResult<bool>;
    fn clear(&self) -> CityResult<()>;
    fn len(&self) -> CityResult<usize>;
}

struct CacheEntry {
    model: Arc<CityModel>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process cache with TTL expiry and least-recently-used eviction.
pub struct MemoryCache {
    policy: CachePolicy,
    entries: Mutex<IndexMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy: CachePolicy::new(policy.max_entries, policy.ttl),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn evict_expired(entries: &mut IndexMap<String, CacheEntry>, now: Instant) {
        entries.retain(|_, entry| entry.is_live(now));
    }

    fn evict_over_capacity(&self, entries: &mut IndexMap<String, CacheEntry>) {
        while entries.len() > self.policy.max_entries {
            entries.shift_remove_index(0);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl CityCache for MemoryCache {
    fn get(&self, key: &str) -> CityResult<Option<Arc<CityModel>>> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Self::evict_expired(&mut entries, now);
        // Move to end for LRU
        let Some(entry) = entries.shift_remove(key) else {
            return Ok(None);
        };
        let model = Arc::clone(&entry.model);
        entries.insert(key.to_string(), entry);
        Ok(Some(model))
    }

    fn put(&self, key: &str, model: Arc<CityModel>) -> CityResult<()> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Self::evict_expired(&mut entries, now);
        entries.shift_remove(key);
        entries.insert(
            key.to_string(),
            CacheEntry {
                model,
                expires_at: self.policy.ttl.map(|ttl| now + ttl),
            },
        );
        self.evict_over_capacity(&mut entries);
        Ok(())
    }

    fn remove(&self, key: &str) -> CityResult<bool> {
        Ok(self.entries.lock().shift_remove(key).is_some())
    }

    fn clear(&self) -> CityResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn len(&self) -> CityResult<usize> {
        let mut entries = self.entries.lock();
        Self::evict_expired(&mut entries, Instant::now());
        Ok(entries.len())
    }
}
