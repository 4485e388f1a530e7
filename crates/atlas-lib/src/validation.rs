//! Parameter validation gates.
//!
//! Every request parameter is checked here before the pipeline touches the
//! cache or the store. Validators turn raw path segments into typed values
//! ([`EntityId`], [`LocationType`]) or a [`ValidationError`] describing the
//! accepted values.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ValidationError;

/// Inclusive bounds accepted for `id` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdBounds {
    pub min: i32,
    pub max: i32,
}

impl Default for IdBounds {
    fn default() -> Self {
        Self { min: 0, max: 1000 }
    }
}

impl IdBounds {
    /// Human-readable description of the accepted range.
    pub fn conditions(&self) -> String {
        format!(
            "Number between {} and {}, required field",
            self.min, self.max
        )
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= i64::from(self.min) && value <= i64::from(self.max)
    }
}

/// Validated identifier of a kingdom or location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i32);

impl EntityId {
    /// Wrap an identifier that is already known to be in range.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Categories of points of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Castle,
    City,
    Town,
    Ruin,
    Landmark,
    Region,
}

impl LocationType {
    /// All accepted categories, in the order they are advertised to clients.
    pub const ALL: [LocationType; 6] = [
        LocationType::Castle,
        LocationType::City,
        LocationType::Town,
        LocationType::Ruin,
        LocationType::Landmark,
        LocationType::Region,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LocationType::Castle => "castle",
            LocationType::City => "city",
            LocationType::Town => "town",
            LocationType::Ruin => "ruin",
            LocationType::Landmark => "landmark",
            LocationType::Region => "region",
        }
    }

    /// Exact, case-sensitive lookup of a category name.
    pub fn from_exact(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    fn conditions() -> String {
        let values = Self::ALL
            .iter()
            .map(|kind| format!("'{}'", kind.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Authorised values : {}", values)
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate an `id` path parameter.
///
/// Only base-10 integer text is accepted; the parsed value must lie within
/// `bounds`. Failures are logged before being returned.
pub fn validate_id(raw: &str, bounds: &IdBounds) -> Result<EntityId, ValidationError> {
    let parsed = raw
        .parse::<i64>()
        .ok()
        .filter(|value| bounds.contains(*value))
        .and_then(|value| i32::try_from(value).ok());

    match parsed {
        Some(id) => Ok(EntityId(id)),
        None => Err(reject(ValidationError {
            field: "id",
            value: raw.to_string(),
            message: "ID taken in parameter doesn't respect the conditions".to_string(),
            conditions: bounds.conditions(),
        })),
    }
}

/// Validate a `type` path parameter against the fixed set of categories.
pub fn validate_type(raw: &str) -> Result<LocationType, ValidationError> {
    LocationType::from_exact(raw).ok_or_else(|| {
        reject(ValidationError {
            field: "type",
            value: raw.to_string(),
            message: "type taken in parameter doesn't respect the conditions".to_string(),
            conditions: LocationType::conditions(),
        })
    })
}

fn reject(err: ValidationError) -> ValidationError {
    error!(
        field = err.field,
        value = %err.value,
        conditions = %err.conditions,
        "{}",
        err.message
    );
    err
}
