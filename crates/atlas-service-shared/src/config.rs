//! Service configuration read from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `SERVICE_NAME` | `atlas` |
//! | `SERVICE_PORT` | `8080` |
//! | `ATLAS_STORE` | `postgres` (`postgres` or `memory`) |
//! | `ATLAS_DATABASE_URL` | built from `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD` |
//! | `ATLAS_DB_MAX_CONNECTIONS` | `10` |
//! | `ATLAS_FIXTURE_PATH` | required when `ATLAS_STORE=memory` |
//! | `ATLAS_CACHE` | `memory` (`redis`, `memory` or `disabled`) |
//! | `ATLAS_REDIS_URL` | built from `REDIS_HOST`, `REDIS_PORT` |
//! | `ATLAS_CACHE_PREFIX` | `atlas:` |
//! | `ATLAS_CACHE_TTL_SECS` | `3600`, `0` never expires |
//! | `ATLAS_CACHE_MAX_ENTRIES` | `10000` for the memory cache, `0` unbounded |
//! | `ATLAS_CACHE_PURGE_SECS` | `60`, `0` disables the memory cache sweep |
//! | `ATLAS_ID_MIN` / `ATLAS_ID_MAX` | `0` / `1000` |
//! | `CORS_ORIGIN` | unset, no CORS layer |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use atlas_lib::{IdBounds, PipelineSettings, StoreSettings};

use crate::state::DEFAULT_SERVICE_NAME;

/// Errors raised while reading configuration. All of them abort startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} has unknown value '{value}' (expected one of: {expected})")]
    UnknownBackend {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("ATLAS_ID_MIN ({min}) is greater than ATLAS_ID_MAX ({max})")]
    InvalidBounds { min: i32, max: i32 },

    #[error("ATLAS_FIXTURE_PATH is required when ATLAS_STORE=memory")]
    MissingFixture,
}

/// Where spatial queries are answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres(StoreSettings),
    Memory { fixture: PathBuf },
}

/// Where response bodies are memoized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Redis {
        url: String,
        prefix: String,
    },
    Memory {
        /// `None` leaves the cache unbounded.
        max_entries: Option<usize>,
        /// Period of the expired-entry sweep; `None` disables it.
        purge_interval: Option<Duration>,
    },
    Disabled,
}

impl CacheBackend {
    /// The in-process cache with its default bound and sweep period.
    pub fn memory() -> Self {
        CacheBackend::Memory {
            max_entries: Some(DEFAULT_CACHE_MAX_ENTRIES),
            purge_interval: Some(Duration::from_secs(DEFAULT_CACHE_PURGE_SECS)),
        }
    }
}

const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;
const DEFAULT_CACHE_PURGE_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Name reported by the health probes.
    pub service_name: String,
    pub port: u16,
    pub store: StoreBackend,
    pub cache: CacheBackend,
    pub pipeline: PipelineSettings,
    pub cors_origin: Option<String>,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = number(&var, "SERVICE_PORT", 8080u16)?;

        let store = match var("ATLAS_STORE").as_deref().unwrap_or("postgres") {
            "postgres" => {
                let url = var("ATLAS_DATABASE_URL").unwrap_or_else(|| {
                    format!(
                        "postgres://{}:{}@{}:{}/{}",
                        var("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                        var("DB_PASSWORD").unwrap_or_default(),
                        var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                        var("DB_PORT").unwrap_or_else(|| "5432".to_string()),
                        var("DB_NAME").unwrap_or_else(|| "atlas_of_thrones".to_string()),
                    )
                });
                let mut settings = StoreSettings::new(url);
                settings.max_connections = number(&var, "ATLAS_DB_MAX_CONNECTIONS", 10u32)?;
                StoreBackend::Postgres(settings)
            }
            "memory" => StoreBackend::Memory {
                fixture: var("ATLAS_FIXTURE_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingFixture)?,
            },
            other => {
                return Err(ConfigError::UnknownBackend {
                    var: "ATLAS_STORE",
                    value: other.to_string(),
                    expected: "postgres, memory",
                })
            }
        };

        let cache = match var("ATLAS_CACHE").as_deref().unwrap_or("memory") {
            "redis" => CacheBackend::Redis {
                url: var("ATLAS_REDIS_URL").unwrap_or_else(|| {
                    format!(
                        "redis://{}:{}",
                        var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
                        var("REDIS_PORT").unwrap_or_else(|| "6379".to_string()),
                    )
                }),
                prefix: var("ATLAS_CACHE_PREFIX").unwrap_or_else(|| "atlas:".to_string()),
            },
            "memory" => {
                let max_entries =
                    number(&var, "ATLAS_CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES)?;
                let purge_secs =
                    number(&var, "ATLAS_CACHE_PURGE_SECS", DEFAULT_CACHE_PURGE_SECS)?;
                CacheBackend::Memory {
                    max_entries: (max_entries > 0).then_some(max_entries),
                    purge_interval: (purge_secs > 0).then(|| Duration::from_secs(purge_secs)),
                }
            }
            "disabled" => CacheBackend::Disabled,
            other => {
                return Err(ConfigError::UnknownBackend {
                    var: "ATLAS_CACHE",
                    value: other.to_string(),
                    expected: "redis, memory, disabled",
                })
            }
        };

        let ttl_secs = number(&var, "ATLAS_CACHE_TTL_SECS", 3600u64)?;
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let defaults = IdBounds::default();
        let bounds = IdBounds {
            min: number(&var, "ATLAS_ID_MIN", defaults.min)?,
            max: number(&var, "ATLAS_ID_MAX", defaults.max)?,
        };
        if bounds.min > bounds.max {
            return Err(ConfigError::InvalidBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }

        Ok(Self {
            service_name: var("SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            port,
            store,
            cache,
            pipeline: PipelineSettings { ttl, bounds },
            cors_origin: var("CORS_ORIGIN"),
        })
    }
}

fn number<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: name,
            value: raw,
        }),
        None => Ok(default),
    }
}
