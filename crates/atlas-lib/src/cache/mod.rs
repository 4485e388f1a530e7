//! Response cache layer.
//!
//! Successful response bodies are memoized under a [`CacheKey`] derived from
//! the request. Backends implement [`ResponseCache`]:
//!
//! - [`MemoryCache`]: in-process, `DashMap` backed.
//! - [`RedisCache`]: shared Redis instance through a connection manager.
//! - [`DisabledCache`]: never hits, drops every write.
//!
//! Callers treat every [`CacheError`] as non-fatal.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use url::form_urlencoded;

use crate::error::CacheError;

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

/// Deterministic identity of a cacheable request.
///
/// Query pairs are percent-decoded, sorted and re-encoded so that parameter
/// order and encoding variants map onto the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(method: &str, path: &str, query: Option<&str>) -> Self {
        let mut pairs: Vec<(String, String)> = query
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        pairs.sort();

        let mut key = format!("{} {}", method.to_ascii_uppercase(), path);
        if !pairs.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter())
                .finish();
            key.push('?');
            key.push_str(&encoded);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A memoized response: status code and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// How a response relates to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Served from a stored entry.
    Hit,
    /// Computed and offered to the cache.
    Miss,
    /// Endpoint is never cached.
    Bypass,
}

impl CacheStatus {
    /// Value of the `x-cache` response header.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value store for response bodies.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Fetch an entry; `Ok(None)` on a miss or an expired entry.
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError>;

    /// Store an entry, replacing any previous value. `ttl` of `None` never expires.
    async fn store(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend(&self) -> &'static str;
}

/// Cache used when caching is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

#[async_trait]
impl ResponseCache for DisabledCache {
    async fn lookup(&self, _key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        Ok(None)
    }

    async fn store(
        &self,
        _key: &CacheKey,
        _response: &CachedResponse,
        _ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "disabled"
    }
}
