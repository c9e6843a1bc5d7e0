use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geocode::Coordinate;

/// One row of the cleaned padron: a nullable free-text address plus whatever
/// other columns the cleaning step produced, carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRecord {
    pub address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            extra: Map::new(),
        }
    }

    pub fn without_address() -> Self {
        Self {
            address: None,
            extra: Map::new(),
        }
    }

    /// Trimmed lookup key. Missing or whitespace-only addresses are
    /// unresolvable and must never be dispatched to a geocoder.
    pub fn address_key(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// An input row augmented with the pipeline's output columns. `latitude` and
/// `longitude` are either both set or both null; `zone_id` is null until the
/// assignment stage runs, and stays null for rows outside every section.
#[derive(Debug, Clone, Serialize)]
pub struct GeoRecord {
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zone_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeoRecord {
    pub fn from_input(input: InputRecord, coordinate: Option<Coordinate>) -> Self {
        Self {
            address: input.address,
            latitude: coordinate.map(|c| c.latitude),
            longitude: coordinate.map(|c| c.longitude),
            zone_id: None,
            extra: input.extra,
        }
    }

    /// The coordinate pair, present only when both halves are.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}
