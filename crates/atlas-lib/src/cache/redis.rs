use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use super::{CacheKey, CachedResponse, ResponseCache};
use crate::error::CacheError;

/// Redis-backed response cache.
///
/// Keys are `prefix + CacheKey`. Values are the status code as a big-endian
/// `u16` followed by the raw body bytes.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect to `url` and namespace every key with `prefix`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        let prefix = prefix.into();
        info!(prefix = %prefix, "connected to redis cache");
        Ok(Self { connection, prefix })
    }

    fn namespaced(&self, key: &CacheKey) -> String {
        format!("{}{}", self.prefix, key.as_str())
    }
}

fn encode(response: &CachedResponse) -> Vec<u8> {
    let mut value = Vec::with_capacity(response.body.len() + 2);
    value.extend_from_slice(&response.status.to_be_bytes());
    value.extend_from_slice(&response.body);
    value
}

fn decode(key: &str, value: &[u8]) -> Result<CachedResponse, CacheError> {
    match value {
        [hi, lo, body @ ..] => Ok(CachedResponse {
            status: u16::from_be_bytes([*hi, *lo]),
            body: body.to_vec(),
        }),
        _ => Err(CacheError::Corrupt {
            key: key.to_string(),
            reason: format!("value of {} bytes has no status prefix", value.len()),
        }),
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let key = self.namespaced(key);
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        value.map(|bytes| decode(&key, &bytes)).transpose()
    }

    async fn store(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let key = self.namespaced(key);
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(encode(response));
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Unavailable(format!(
                "unexpected PING reply '{}'",
                reply
            )))
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
