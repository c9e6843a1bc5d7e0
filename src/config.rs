use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use tracing::debug;

use crate::errors::{GeoError, GeoResult};

const DEFAULT_PROVIDER: &str = "nominatim";
const DEFAULT_USER_AGENT: &str = "geozona/0.1";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub provider: String,
    pub geocoder_base_url: Option<String>,
    pub geocoder_api_key: Option<SecretString>,
    pub user_agent: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            provider: env::var("GEOCODER_PROVIDER").unwrap_or_else(|_| DEFAULT_PROVIDER.into()),
            geocoder_base_url: env::var("GEOCODER_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            geocoder_api_key: env::var("GEOCODER_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            user_agent: env::var("GEOCODER_USER_AGENT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.into(),
            geocoder_base_url: None,
            geocoder_api_key: None,
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

/// Closed set of supported geocoding providers. Selection happens once, when
/// the pipeline is configured; everything downstream sees one client behind
/// the `GeocodeClient` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Nominatim,
    LocationIq,
}

impl ProviderKind {
    pub fn parse(value: &str) -> GeoResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nominatim" => Ok(ProviderKind::Nominatim),
            "locationiq" => Ok(ProviderKind::LocationIq),
            other => Err(GeoError::UnknownProvider(other.to_string())),
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            ProviderKind::Nominatim => "nominatim",
            ProviderKind::LocationIq => "locationiq",
        }
    }

    /// Dispatch limits the provider's usage policy demands. Nominatim allows
    /// a single request in flight and just under one per second; LocationIQ
    /// tolerates two workers at 2 req/s each key.
    pub fn profile(&self) -> ProviderProfile {
        match self {
            ProviderKind::Nominatim => ProviderProfile {
                workers: 1,
                min_delay: Duration::from_millis(1100),
            },
            ProviderKind::LocationIq => ProviderProfile {
                workers: 2,
                min_delay: Duration::from_millis(500),
            },
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Nominatim => "https://nominatim.openstreetmap.org/search",
            ProviderKind::LocationIq => "https://us1.locationiq.com/v1/search",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderKind::LocationIq)
    }
}

/// Per-provider concurrency and pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    pub workers: usize,
    pub min_delay: Duration,
}

impl ProviderProfile {
    /// Registry lookup by provider name. Unknown names fail here, before any
    /// lookup is dispatched.
    pub fn lookup(name: &str) -> GeoResult<Self> {
        ProviderKind::parse(name).map(|kind| kind.profile())
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}
