mod config;
mod errors;
mod geocode;
mod merge;
mod pipeline;
mod records;
mod resolver;
mod zones;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::{AppConfig, ProviderKind, ProviderProfile};
pub use errors::{GeoError, GeoResult};
pub use geocode::{
    Coordinate, GeocodeClient, GeocodeOutcome, LookupError, NominatimClient, LOOKUP_TIMEOUT,
};
pub use merge::merge_results;
pub use pipeline::{Georeferencer, RunReport, RunSummary};
pub use records::{GeoRecord, InputRecord};
pub use resolver::{AddressResolver, GeocodeCache, ProgressObserver, ResolutionProgress};
pub use zones::{assign_zones, ZoneIndex};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,geozona=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
