use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo::{
    Coord, Geometry, GeometryCollection, Intersects, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{SpatialStore, SummaryKind};
use crate::error::StoreError;
use crate::model::{PointOfInterestRow, RegionRow, RegionSizeRow, SummaryRow};
use crate::validation::{EntityId, LocationType};

/// On-disk fixture document for [`MemoryStore`].
///
/// ```json
/// {
///   "kingdoms":  [{"gid": 1, "name": "The North", "area_sq_m": 2000000.0,
///                  "summary": "...", "url": "...", "geometry": {"type": "Polygon", ...}}],
///   "locations": [{"gid": 7, "name": "Winterfell", "type": "Castle",
///                  "summary": "...", "url": "...", "geometry": {"type": "Point", ...}}]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub kingdoms: Vec<KingdomRecord>,
    #[serde(default)]
    pub locations: Vec<LocationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KingdomRecord {
    pub gid: i32,
    pub name: Option<String>,
    /// Stored area in square meters, as `ST_Area(geog)` would report it.
    pub area_sq_m: Option<f64>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub geometry: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    pub gid: i32,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub geometry: Value,
}

#[derive(Debug)]
struct Indexed<R> {
    record: R,
    geojson: String,
    shape: Geometry<f64>,
}

/// In-process spatial store backed by a fixture document.
///
/// Intersections are evaluated on planar coordinates, which is adequate for
/// fixtures and local development; production deployments use
/// [`PostgisStore`](super::PostgisStore).
#[derive(Debug)]
pub struct MemoryStore {
    kingdoms: Vec<Indexed<KingdomRecord>>,
    locations: Vec<Indexed<LocationRecord>>,
}

impl MemoryStore {
    /// Load a fixture document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| StoreError::FixtureIo {
            path: path.to_path_buf(),
            source,
        })?;
        let fixture: StoreFixture =
            serde_json::from_str(&text).map_err(|e| StoreError::FixtureFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let store = Self::build(fixture, path)?;
        info!(
            path = %path.display(),
            kingdoms = store.kingdoms.len(),
            locations = store.locations.len(),
            "fixture store loaded"
        );
        Ok(store)
    }

    /// Build a store from an already-parsed fixture.
    pub fn from_fixture(fixture: StoreFixture) -> Result<Self, StoreError> {
        Self::build(fixture, Path::new("<memory>"))
    }

    fn build(fixture: StoreFixture, origin: &Path) -> Result<Self, StoreError> {
        let invalid = |gid: i32, message: String| StoreError::FixtureFormat {
            path: PathBuf::from(origin),
            message: format!("record {}: {}", gid, message),
        };

        let kingdoms = fixture
            .kingdoms
            .into_iter()
            .map(|record| {
                let shape = to_geometry(&record.geometry).map_err(|m| invalid(record.gid, m))?;
                let geojson = record.geometry.to_string();
                Ok(Indexed {
                    record,
                    geojson,
                    shape,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let locations = fixture
            .locations
            .into_iter()
            .map(|record| {
                let shape = to_geometry(&record.geometry).map_err(|m| invalid(record.gid, m))?;
                let geojson = record.geometry.to_string();
                Ok(Indexed {
                    record,
                    geojson,
                    shape,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Self {
            kingdoms,
            locations,
        })
    }

    fn kingdom(&self, id: EntityId) -> Option<&Indexed<KingdomRecord>> {
        self.kingdoms.iter().find(|k| k.record.gid == id.get())
    }

    fn location(&self, id: EntityId) -> Option<&Indexed<LocationRecord>> {
        self.locations.iter().find(|l| l.record.gid == id.get())
    }
}

fn missing(table: &str, gid: i32, column: &str) {
    warn!(table, gid, column, "skipping row with missing column");
}

#[async_trait]
impl SpatialStore for MemoryStore {
    async fn current_time(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(Utc::now())
    }

    async fn locations_by_type(
        &self,
        kind: LocationType,
    ) -> Result<Vec<PointOfInterestRow>, StoreError> {
        let rows = self
            .locations
            .iter()
            .filter_map(|l| {
                let stored = l.record.kind.as_deref()?;
                if !stored.eq_ignore_ascii_case(kind.as_str()) {
                    return None;
                }
                let Some(name) = l.record.name.clone() else {
                    missing("locations", l.record.gid, "name");
                    return None;
                };
                Some(PointOfInterestRow {
                    gid: l.record.gid,
                    name,
                    kind: stored.to_string(),
                    geojson: l.geojson.clone(),
                })
            })
            .collect();
        Ok(rows)
    }

    async fn all_region_boundaries(&self) -> Result<Vec<RegionRow>, StoreError> {
        let rows = self
            .kingdoms
            .iter()
            .filter_map(|k| {
                let Some(name) = k.record.name.clone() else {
                    missing("kingdoms", k.record.gid, "name");
                    return None;
                };
                Some(RegionRow {
                    gid: k.record.gid,
                    name,
                    geojson: k.geojson.clone(),
                })
            })
            .collect();
        Ok(rows)
    }

    async fn region_size(&self, id: EntityId) -> Result<Option<RegionSizeRow>, StoreError> {
        let Some(kingdom) = self.kingdom(id) else {
            return Ok(None);
        };
        match kingdom.record.area_sq_m {
            Some(square_meters) => Ok(Some(RegionSizeRow {
                gid: kingdom.record.gid,
                square_meters,
            })),
            None => {
                missing("kingdoms", kingdom.record.gid, "area_sq_m");
                Ok(None)
            }
        }
    }

    async fn poi_count_in_region(
        &self,
        id: EntityId,
        category: LocationType,
    ) -> Result<i64, StoreError> {
        let Some(kingdom) = self.kingdom(id) else {
            return Ok(0);
        };
        let count = self
            .locations
            .iter()
            .filter(|l| {
                l.record
                    .kind
                    .as_deref()
                    .is_some_and(|k| k.eq_ignore_ascii_case(category.as_str()))
            })
            .filter(|l| kingdom.shape.intersects(&l.shape))
            .count();
        Ok(count as i64)
    }

    async fn summary(
        &self,
        kind: SummaryKind,
        id: EntityId,
    ) -> Result<Option<SummaryRow>, StoreError> {
        let fields = match kind {
            SummaryKind::Region => self
                .kingdom(id)
                .map(|k| (k.record.summary.clone(), k.record.url.clone())),
            SummaryKind::Location => self
                .location(id)
                .map(|l| (l.record.summary.clone(), l.record.url.clone())),
        };
        Ok(match fields {
            Some((Some(summary), Some(url))) => Some(SummaryRow { summary, url }),
            Some(_) => {
                missing(kind.collection(), id.get(), "summary");
                None
            }
            None => None,
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Convert a GeoJSON geometry object into a `geo` geometry.
fn to_geometry(value: &Value) -> Result<Geometry<f64>, String> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry has no type")?;

    if kind == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or("geometry collection has no geometries")?;
        let members = members
            .iter()
            .map(to_geometry)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(members)));
    }

    let coords = value
        .get("coordinates")
        .ok_or("geometry has no coordinates")?;
    match kind {
        "Point" => Ok(Geometry::Point(Point::from(coord(coords)?))),
        "MultiPoint" => Ok(Geometry::MultiPoint(MultiPoint(
            coord_list(coords)?.into_iter().map(Point::from).collect(),
        ))),
        "LineString" => Ok(Geometry::LineString(LineString::new(coord_list(coords)?))),
        "MultiLineString" => {
            let lines = array(coords)?
                .iter()
                .map(|line| coord_list(line).map(LineString::new))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::MultiLineString(MultiLineString::new(lines)))
        }
        "Polygon" => Ok(Geometry::Polygon(polygon(coords)?)),
        "MultiPolygon" => {
            let polygons = array(coords)?
                .iter()
                .map(polygon)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        other => Err(format!("unsupported geometry type '{}'", other)),
    }
}

fn array(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| "coordinates must be an array".to_string())
}

fn coord(value: &Value) -> Result<Coord<f64>, String> {
    let position = array(value)?;
    match (
        position.first().and_then(Value::as_f64),
        position.get(1).and_then(Value::as_f64),
    ) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err("position must start with two numbers".to_string()),
    }
}

fn coord_list(value: &Value) -> Result<Vec<Coord<f64>>, String> {
    array(value)?.iter().map(coord).collect()
}

fn polygon(value: &Value) -> Result<Polygon<f64>, String> {
    let mut rings = array(value)?
        .iter()
        .map(|ring| coord_list(ring).map(LineString::new));
    let exterior = rings.next().ok_or("polygon has no exterior ring")??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}
