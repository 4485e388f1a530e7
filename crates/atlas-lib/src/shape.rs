//! GeoJSON shaping of store rows.

use serde_json::Value;

use crate::error::StoreError;
use crate::model::{FeatureProperties, GeoFeature, PointOfInterestRow, RegionRow};

/// Attach identity properties to the GeoJSON geometry text of a row.
///
/// The geometry object is parsed but otherwise left untouched; a `properties`
/// member already present in the text is replaced. Text that does not parse
/// into a JSON object is reported as [`StoreError::MalformedGeometry`].
pub fn shape(geojson: &str, properties: FeatureProperties) -> Result<GeoFeature, StoreError> {
    let gid = properties.id;
    let value: Value =
        serde_json::from_str(geojson).map_err(|e| StoreError::MalformedGeometry {
            gid,
            reason: e.to_string(),
        })?;

    let Value::Object(mut geometry) = value else {
        return Err(StoreError::MalformedGeometry {
            gid,
            reason: "geometry is not a JSON object".to_string(),
        });
    };
    if !geometry.contains_key("type") {
        return Err(StoreError::MalformedGeometry {
            gid,
            reason: "geometry has no type member".to_string(),
        });
    }
    geometry.remove("properties");

    Ok(GeoFeature {
        geometry,
        properties,
    })
}

/// Shape a location row; the stored category is carried into `properties.type`.
pub fn shape_location(row: &PointOfInterestRow) -> Result<GeoFeature, StoreError> {
    shape(
        &row.geojson,
        FeatureProperties {
            name: row.name.clone(),
            kind: Some(row.kind.clone()),
            id: row.gid,
        },
    )
}

/// Shape a kingdom boundary row.
pub fn shape_region(row: &RegionRow) -> Result<GeoFeature, StoreError> {
    shape(
        &row.geojson,
        FeatureProperties {
            name: row.name.clone(),
            kind: None,
            id: row.gid,
        },
    )
}
