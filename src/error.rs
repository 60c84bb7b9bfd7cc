use thiserror::Error;

use crate::config::ConfigError;
use crate::ring::RingError;
use crate::route::RouteError;
use crate::types::CodecError;

/// Crate-level convenience error.
///
/// A thin wrapper over the subsystem errors; each variant keeps its own
/// diagnostic detail.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Ring(#[from] RingError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
