//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A capability name did not match any known capability.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// The bundle configuration is invalid.
    #[error("invalid bundle configuration: {0}")]
    Invalid(String),

    /// Failed to parse a bundle configuration.
    #[error("failed to parse bundles: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
