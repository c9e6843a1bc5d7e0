use crate::records::{GeoRecord, InputRecord};
use crate::resolver::GeocodeCache;

/// Projects the completed cache back onto the full row sequence. Row count
/// and order are preserved; duplicate addresses all receive the cached
/// outcome of their single lookup. Rows without a usable address get null
/// coordinates without touching the cache.
pub fn merge_results(records: Vec<InputRecord>, cache: &GeocodeCache) -> Vec<GeoRecord> {
    records
        .into_iter()
        .map(|record| {
            let coordinate = record
                .address_key()
                .and_then(|key| cache.get(key))
                .and_then(|outcome| outcome.coordinate());
            GeoRecord::from_input(record, coordinate)
        })
        .collect()
}
