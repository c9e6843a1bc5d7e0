use std::io;

use thiserror::Error;

pub type GeoResult<T> = Result<T, GeoError>;

/// Fatal errors only. Per-address lookup failures never reach this type; the
/// resolver absorbs them into unresolved outcomes.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("unknown geocoding provider: {0}")]
    UnknownProvider(String),
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
