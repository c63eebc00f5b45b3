//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file does not exist.
    ///
    /// This typically means no token has been issued yet.
    #[error("database not found at {path}. Issue a token first")]
    DatabaseNotFound { path: PathBuf },

    /// No token with the given id exists in the tenant.
    #[error("no token '{id}' in this tenant")]
    TokenNotFound { id: String },

    /// An event or proposal file could not be parsed.
    #[error("invalid snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Configuration is invalid or unreadable.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An error occurred in the authorization layer.
    #[error(transparent)]
    Access(#[from] access::Error),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
