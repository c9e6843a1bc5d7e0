use geo::{Contains, MultiPolygon, Point, Polygon};
use tracing::trace;

use crate::geocode::Coordinate;
use crate::records::GeoRecord;

/// Ordered set of electoral-section polygons, already in WGS84 degrees.
/// Loaded once per run and immutable afterwards; iteration order is the
/// order the sections were added, and containment ties resolve to the
/// earliest section.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<Zone>,
}

#[derive(Debug, Clone)]
struct Zone {
    id: String,
    geometry: MultiPolygon,
}

impl ZoneIndex {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, MultiPolygon)>,
    {
        Self {
            zones: pairs
                .into_iter()
                .map(|(id, geometry)| Zone { id, geometry })
                .collect(),
        }
    }

    pub fn push_polygon(&mut self, id: impl Into<String>, polygon: Polygon) {
        self.zones.push(Zone {
            id: id.into(),
            geometry: MultiPolygon::new(vec![polygon]),
        });
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// First section containing the point, in index order. Points inside no
    /// section return None.
    pub fn locate(&self, coordinate: Coordinate) -> Option<&str> {
        // geo points are (x, y) = (longitude, latitude)
        let point = Point::new(coordinate.longitude, coordinate.latitude);
        self.zones
            .iter()
            .find(|zone| zone.geometry.contains(&point))
            .map(|zone| zone.id.as_str())
    }
}

/// Fills `zone_id` for every row with a valid coordinate pair, in one linear
/// pass. Rows without coordinates are never tested against the index, and an
/// empty index simply leaves every row unassigned.
pub fn assign_zones(records: &mut [GeoRecord], index: &ZoneIndex) {
    for record in records.iter_mut() {
        let Some(coordinate) = record.coordinate() else {
            continue;
        };
        record.zone_id = index.locate(coordinate).map(str::to_string);
        trace!(
            latitude = coordinate.latitude,
            longitude = coordinate.longitude,
            zone = record.zone_id.as_deref(),
            "containment tested"
        );
    }
}
