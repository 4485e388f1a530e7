use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{CacheKey, CachedResponse, ResponseCache};
use crate::error::CacheError;

#[derive(Debug, Clone)]
struct Entry {
    response: CachedResponse,
    stored_at: Instant,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process response cache.
///
/// Clones share the same entries. Expired entries are evicted when they are
/// looked up or by [`MemoryCache::purge_expired`]. A bounded cache makes room
/// for a new key by purging expired entries first, then the oldest write.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    max_entries: Option<usize>,
}

impl MemoryCache {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `max_entries` keys (at least one).
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: Arc::default(),
            max_entries: Some(max_entries.max(1)),
        }
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    fn make_room(&self, key: &str) {
        let Some(max) = self.max_entries else {
            return;
        };
        if self.entries.len() < max || self.entries.contains_key(key) {
            return;
        }
        self.purge_expired();
        while self.entries.len() >= max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    debug!(key = %oldest, max, "evicted oldest cache entry");
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let now = Instant::now();
        // Clone out so the shard guard is released before any removal.
        let entry = self.entries.get(key.as_str()).map(|e| e.value().clone());
        match entry {
            Some(entry) if entry.is_expired(now) => {
                self.entries
                    .remove_if(key.as_str(), |_, current| current.is_expired(now));
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.response)),
            None => Ok(None),
        }
    }

    async fn store(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.make_room(key.as_str());
        let now = Instant::now();
        self.entries.insert(
            key.as_str().to_string(),
            Entry {
                response: response.clone(),
                stored_at: now,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
