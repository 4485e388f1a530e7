//! Spatial query layer.
//!
//! [`SpatialStore`] is the read-only contract the pipeline queries. Two
//! implementations are provided:
//!
//! - [`PostgisStore`]: PostgreSQL + PostGIS through a shared `sqlx` pool.
//! - [`MemoryStore`]: an in-process store loaded from a JSON fixture, with
//!   spatial predicates evaluated by the `geo` crate.
//!
//! Store failures are returned as [`StoreError`] and never retried here.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, StoreError};
use crate::model::{PointOfInterestRow, RegionRow, RegionSizeRow, SummaryRow};
use crate::validation::{EntityId, LocationType};

mod memory;
mod postgis;

pub use memory::{MemoryStore, StoreFixture};
pub use postgis::{PostgisStore, StoreSettings};

/// Which table a summary is read from.
///
/// Each variant maps to a fixed query; table names are never interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryKind {
    Region,
    Location,
}

impl SummaryKind {
    /// Public collection name used in paths (`kingdoms`, `locations`).
    pub fn collection(self) -> &'static str {
        match self {
            SummaryKind::Region => "kingdoms",
            SummaryKind::Location => "locations",
        }
    }

    /// Entity label used in not-found errors.
    pub fn entity(self) -> &'static str {
        match self {
            SummaryKind::Region => "kingdom",
            SummaryKind::Location => "location",
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for SummaryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kingdoms" => Ok(SummaryKind::Region),
            "locations" => Ok(SummaryKind::Location),
            other => Err(Error::configuration(format!(
                "unknown summary table '{}'",
                other
            ))),
        }
    }
}

/// Read operations over kingdoms and locations.
///
/// Implementations must be safe to share across concurrently running requests
/// without external locking.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Current store time; used as a liveness probe.
    async fn current_time(&self) -> Result<DateTime<Utc>, StoreError>;

    /// Locations whose stored type matches `kind`, ignoring case.
    async fn locations_by_type(
        &self,
        kind: LocationType,
    ) -> Result<Vec<PointOfInterestRow>, StoreError>;

    /// Boundaries of every kingdom.
    async fn all_region_boundaries(&self) -> Result<Vec<RegionRow>, StoreError>;

    /// Area of one kingdom, or `None` when the id is unknown.
    async fn region_size(&self, id: EntityId) -> Result<Option<RegionSizeRow>, StoreError>;

    /// Number of locations of `category` whose geometry intersects the kingdom.
    async fn poi_count_in_region(
        &self,
        id: EntityId,
        category: LocationType,
    ) -> Result<i64, StoreError>;

    /// Summary text and URL of a kingdom or location, or `None` when unknown.
    async fn summary(
        &self,
        kind: SummaryKind,
        id: EntityId,
    ) -> Result<Option<SummaryRow>, StoreError>;

    /// Short backend name for logs and readiness reports.
    fn backend(&self) -> &'static str;
}
