use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{info, warn};

use super::{SpatialStore, SummaryKind};
use crate::error::StoreError;
use crate::model::{PointOfInterestRow, RegionRow, RegionSizeRow, SummaryRow};
use crate::validation::{EntityId, LocationType};

const TIME_QUERY: &str = "SELECT NOW() AS now";

const LOCATIONS_QUERY: &str = "\
    SELECT ST_AsGeoJSON(geog) AS geojson, name, type, gid \
    FROM locations \
    WHERE UPPER(type) = UPPER($1)";

const BOUNDARIES_QUERY: &str = "\
    SELECT ST_AsGeoJSON(geog) AS geojson, name, gid \
    FROM kingdoms";

const REGION_SIZE_QUERY: &str = "\
    SELECT gid, ST_Area(geog) AS size \
    FROM kingdoms \
    WHERE gid = $1 \
    LIMIT 1";

const POI_COUNT_QUERY: &str = "\
    SELECT count(*) \
    FROM kingdoms, locations \
    WHERE ST_Intersects(kingdoms.geog, locations.geog) \
    AND kingdoms.gid = $1 \
    AND UPPER(locations.type) = UPPER($2)";

const REGION_SUMMARY_QUERY: &str = "\
    SELECT summary, url \
    FROM kingdoms \
    WHERE gid = $1 \
    LIMIT 1";

const LOCATION_SUMMARY_QUERY: &str = "\
    SELECT summary, url \
    FROM locations \
    WHERE gid = $1 \
    LIMIT 1";

fn summary_query(kind: SummaryKind) -> &'static str {
    match kind {
        SummaryKind::Region => REGION_SUMMARY_QUERY,
        SummaryKind::Location => LOCATION_SUMMARY_QUERY,
    }
}

/// Connection settings for [`PostgisStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl StoreSettings {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// PostGIS-backed spatial store.
///
/// The pool is cheap to clone and safe to share across request tasks.
#[derive(Debug, Clone)]
pub struct PostgisStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct RawLocationRow {
    gid: i32,
    name: Option<String>,
    #[sqlx(rename = "type")]
    kind: Option<String>,
    geojson: Option<String>,
}

#[derive(Debug, FromRow)]
struct RawRegionRow {
    gid: i32,
    name: Option<String>,
    geojson: Option<String>,
}

#[derive(Debug, FromRow)]
struct RawSizeRow {
    gid: i32,
    size: Option<f64>,
}

#[derive(Debug, FromRow)]
struct RawSummaryRow {
    summary: Option<String>,
    url: Option<String>,
}

impl PostgisStore {
    /// Open a pool against the configured database.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.database_url)
            .await?;

        info!(
            max_connections = settings.max_connections,
            "connected to spatial database"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Drop rows that lack a required column, logging each one.
fn complete<R, T>(
    rows: Vec<R>,
    table: &str,
    convert: impl Fn(R) -> Result<T, (i32, &'static str)>,
) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match convert(row) {
            Ok(value) => Some(value),
            Err((gid, column)) => {
                warn!(table, gid, column, "skipping row with missing column");
                None
            }
        })
        .collect()
}

#[async_trait]
impl SpatialStore for PostgisStore {
    async fn current_time(&self) -> Result<DateTime<Utc>, StoreError> {
        let now: DateTime<Utc> = sqlx::query_scalar(TIME_QUERY)
            .fetch_one(&self.pool)
            .await?;
        Ok(now)
    }

    async fn locations_by_type(
        &self,
        kind: LocationType,
    ) -> Result<Vec<PointOfInterestRow>, StoreError> {
        let rows: Vec<RawLocationRow> = sqlx::query_as(LOCATIONS_QUERY)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(complete(rows, "locations", |row| {
            Ok(PointOfInterestRow {
                gid: row.gid,
                name: row.name.ok_or((row.gid, "name"))?,
                kind: row.kind.ok_or((row.gid, "type"))?,
                geojson: row.geojson.ok_or((row.gid, "geog"))?,
            })
        }))
    }

    async fn all_region_boundaries(&self) -> Result<Vec<RegionRow>, StoreError> {
        let rows: Vec<RawRegionRow> = sqlx::query_as(BOUNDARIES_QUERY)
            .fetch_all(&self.pool)
            .await?;

        Ok(complete(rows, "kingdoms", |row| {
            Ok(RegionRow {
                gid: row.gid,
                name: row.name.ok_or((row.gid, "name"))?,
                geojson: row.geojson.ok_or((row.gid, "geog"))?,
            })
        }))
    }

    async fn region_size(&self, id: EntityId) -> Result<Option<RegionSizeRow>, StoreError> {
        let row: Option<RawSizeRow> = sqlx::query_as(REGION_SIZE_QUERY)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|row| match row.size {
            Some(square_meters) => Some(RegionSizeRow {
                gid: row.gid,
                square_meters,
            }),
            None => {
                warn!(table = "kingdoms", gid = row.gid, "kingdom has no geometry");
                None
            }
        }))
    }

    async fn poi_count_in_region(
        &self,
        id: EntityId,
        category: LocationType,
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(POI_COUNT_QUERY)
            .bind(id.get())
            .bind(category.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn summary(
        &self,
        kind: SummaryKind,
        id: EntityId,
    ) -> Result<Option<SummaryRow>, StoreError> {
        let row: Option<RawSummaryRow> = sqlx::query_as(summary_query(kind))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|row| match (row.summary, row.url) {
            (Some(summary), Some(url)) => Some(SummaryRow { summary, url }),
            _ => {
                warn!(table = kind.collection(), gid = id.get(), "summary row is incomplete");
                None
            }
        }))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_queries_are_fixed_per_kind() {
        assert!(summary_query(SummaryKind::Region).contains("FROM kingdoms"));
        assert!(summary_query(SummaryKind::Location).contains("FROM locations"));
        assert!(!summary_query(SummaryKind::Region).contains("locations"));
    }

    #[test]
    fn every_parameterized_query_binds_its_inputs() {
        for query in [
            LOCATIONS_QUERY,
            REGION_SIZE_QUERY,
            REGION_SUMMARY_QUERY,
            LOCATION_SUMMARY_QUERY,
        ] {
            assert!(query.contains("$1"), "{query}");
        }
        assert!(POI_COUNT_QUERY.contains("$1") && POI_COUNT_QUERY.contains("$2"));
        assert!(POI_COUNT_QUERY.contains("ST_Intersects"));
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let rows = vec![
            RawRegionRow {
                gid: 1,
                name: Some("The North".to_string()),
                geojson: Some("{}".to_string()),
            },
            RawRegionRow {
                gid: 2,
                name: None,
                geojson: Some("{}".to_string()),
            },
        ];
        let kept = complete(rows, "kingdoms", |row| {
            Ok(RegionRow {
                gid: row.gid,
                name: row.name.ok_or((row.gid, "name"))?,
                geojson: row.geojson.ok_or((row.gid, "geog"))?,
            })
        });
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].gid, 1);
    }

    #[test]
    fn store_settings_defaults() {
        let settings = StoreSettings::new("postgres://localhost/atlas");
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(5));
    }
}
