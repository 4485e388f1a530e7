//! Typed rows returned by the spatial store and the bodies built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::EntityId;

/// A kingdom boundary: identifier, name and GeoJSON geometry text.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRow {
    pub gid: i32,
    pub name: String,
    pub geojson: String,
}

/// A point of interest with its stored category.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterestRow {
    pub gid: i32,
    pub name: String,
    /// Category as stored, which may differ in case from [`LocationType`](crate::LocationType).
    pub kind: String,
    pub geojson: String,
}

/// Area of a single kingdom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSizeRow {
    pub gid: i32,
    pub square_meters: f64,
}

impl RegionSizeRow {
    pub fn square_kilometers(&self) -> f64 {
        self.square_meters / 1_000_000.0
    }
}

/// Descriptive text and reference URL of a kingdom or location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub summary: String,
    pub url: String,
}

/// Identity properties injected into every shaped feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub id: i32,
}

/// A store geometry object with an injected `properties` member.
///
/// The geometry members (`type`, `coordinates`, `geometries`, ...) are kept
/// exactly as produced by the store and serialized alongside `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    #[serde(flatten)]
    pub geometry: serde_json::Map<String, serde_json::Value>,
    pub properties: FeatureProperties,
}

/// Body of `/time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBody {
    pub now: DateTime<Utc>,
}

/// Body of `/kingdoms/{id}/size`, in square kilometers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeBody {
    pub id: EntityId,
    pub size: f64,
}

/// Body of `/kingdoms/{id}/castles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBody {
    pub count: i64,
}
