use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::{AppConfig, ProviderKind, ProviderProfile};
use crate::errors::GeoResult;
use crate::geocode::{GeocodeClient, NominatimClient};
use crate::merge::merge_results;
use crate::records::{GeoRecord, InputRecord};
use crate::resolver::{AddressResolver, GeocodeCache, ProgressObserver};
use crate::zones::{assign_zones, ZoneIndex};

/// End-to-end run: geocode the distinct addresses, merge coordinates onto
/// every row, then assign each located row its electoral section.
pub struct Georeferencer {
    resolver: AddressResolver,
    zones: ZoneIndex,
}

impl std::fmt::Debug for Georeferencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Georeferencer")
            .field("zones", &self.zones)
            .finish_non_exhaustive()
    }
}

impl Georeferencer {
    /// Builds the pipeline from configuration. Unknown provider names and a
    /// missing API key for a keyed provider fail here, before any row is
    /// touched.
    pub fn from_config(config: &AppConfig, zones: ZoneIndex) -> GeoResult<Self> {
        let kind = ProviderKind::parse(&config.provider)?;
        let client = Arc::new(NominatimClient::new(config, kind)?);
        info!(provider = kind.as_tag(), sections = zones.len(), "pipeline configured");
        Ok(Self::new(client, kind.profile(), zones))
    }

    /// Assembly from parts, for callers that bring their own client.
    pub fn new(
        client: Arc<dyn GeocodeClient>,
        profile: ProviderProfile,
        zones: ZoneIndex,
    ) -> Self {
        Self {
            resolver: AddressResolver::new(client, profile),
            zones,
        }
    }

    /// Runs the full pipeline. Never fails: every per-row condition degrades
    /// to null output fields, and the report stays row-aligned with the
    /// input.
    pub async fn run(
        &self,
        records: Vec<InputRecord>,
        observer: Option<ProgressObserver>,
        cancel_flag: Option<Arc<AtomicBool>>,
    ) -> RunReport {
        let started_at = Utc::now();
        let cache = self
            .resolver
            .resolve_all(&records, observer, cancel_flag)
            .await;

        let mut records = merge_results(records, &cache);
        assign_zones(&mut records, &self.zones);

        let summary = RunSummary::tally(&records, &cache, started_at);
        info!(
            resolved = summary.resolved_addresses,
            unresolved = summary.unresolved_addresses,
            assigned = summary.rows_assigned,
            unassigned = summary.rows_unassigned,
            "run finished"
        );
        RunReport { records, summary }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub records: Vec<GeoRecord>,
    pub summary: RunSummary,
}

/// What a run reports back: address-level resolution counts and row-level
/// assignment counts.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_rows: usize,
    pub distinct_addresses: usize,
    pub resolved_addresses: usize,
    pub unresolved_addresses: usize,
    pub rows_with_coordinates: usize,
    pub rows_assigned: usize,
    pub rows_unassigned: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    fn tally(records: &[GeoRecord], cache: &GeocodeCache, started_at: DateTime<Utc>) -> Self {
        let resolved_addresses = cache.resolved_count();
        let rows_with_coordinates = records
            .iter()
            .filter(|record| record.coordinate().is_some())
            .count();
        let rows_assigned = records
            .iter()
            .filter(|record| record.zone_id.is_some())
            .count();
        Self {
            total_rows: records.len(),
            distinct_addresses: cache.len(),
            resolved_addresses,
            unresolved_addresses: cache.len() - resolved_addresses,
            rows_with_coordinates,
            rows_assigned,
            rows_unassigned: records.len() - rows_assigned,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
