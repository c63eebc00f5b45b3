use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed credential, unknown id, wrong tenant, wrong secret or
    /// revoked token. Callers cannot tell these apart.
    #[error("invalid token")]
    InvalidToken,

    #[error("specify either calendar_id or event_id, not both")]
    InvalidParameterCombination,

    #[error("either calendar_id or event_id must be specified")]
    MissingRequiredParameter,

    #[error("no token resolved; resolve a token before checking capabilities")]
    ServiceNotInitialized,

    #[error("at least one permission must be specified to create a token")]
    NoPermissionsSpecified,

    #[error(transparent)]
    Storage(storage::Error),
}

impl From<storage::Error> for Error {
    fn from(err: storage::Error) -> Self {
        match err {
            storage::Error::InvalidCredential(_) => Error::InvalidToken,
            storage::Error::NoPermissionsSpecified => Error::NoPermissionsSpecified,
            other => Error::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_lifted() {
        assert!(matches!(
            Error::from(storage::Error::InvalidCredential("x")),
            Error::InvalidToken
        ));
        assert!(matches!(
            Error::from(storage::Error::NoPermissionsSpecified),
            Error::NoPermissionsSpecified
        ));
        assert!(matches!(
            Error::from(storage::Error::NotFound("t".into())),
            Error::Storage(_)
        ));
    }
}
