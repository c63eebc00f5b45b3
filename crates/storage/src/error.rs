use crate::TokenId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("at least one permission must be specified to create a token")]
    NoPermissionsSpecified,

    #[error("token {0} is revoked")]
    Revoked(TokenId),

    #[error("invalid credential: {0}")]
    InvalidCredential(&'static str),

    #[error("corrupt token record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
