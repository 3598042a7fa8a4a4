//! Crate-level error type

use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the relay
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Room/source registry rejected an operation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Inbound envelope could not be decoded
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration value could not be used
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The coordinator task has stopped
    #[error("relay coordinator is not running")]
    CoordinatorClosed,
}
