//! Credential verification and token resolution.

use crate::{Access, DenyReason, Error, ResolvedToken, Result};
use policy::{CalendarId, EventId, TenantId, UserId};
use storage::{Credential, TokenScope, TokenStore, decode_bearer, verify_secret};
use tracing::{debug, trace};

/// Resolves credentials against a [`TokenStore`].
///
/// Holds no state besides the store reference, so one verifier can serve
/// any number of sequential requests. [`TokenStore`] owns a single SQLite
/// connection and is not `Sync`; verify in parallel with one store per
/// thread.
#[derive(Clone, Copy)]
pub struct Verifier<'a> {
    store: &'a TokenStore,
}

impl<'a> Verifier<'a> {
    pub fn new(store: &'a TokenStore) -> Self {
        Self { store }
    }

    /// Resolve an encoded bearer credential within `tenant`.
    pub fn resolve(&self, bearer: &str, tenant: TenantId) -> Result<ResolvedToken> {
        let credential = decode_bearer(bearer).map_err(|e| {
            debug!(tenant = %tenant, error = %e, "rejected credential");
            Error::from(e)
        })?;
        self.resolve_credential(&credential, tenant)
    }

    /// Resolve an already decoded `(token_id, secret)` pair within `tenant`.
    pub fn resolve_credential(
        &self,
        credential: &Credential,
        tenant: TenantId,
    ) -> Result<ResolvedToken> {
        let id = credential.token_id;
        let Some(token) = self.store.get(tenant, id)? else {
            debug!(tenant = %tenant, token = %id, "rejected credential: unknown token");
            return Err(Error::InvalidToken);
        };

        let Some(hash) = token.secret_hash.as_deref() else {
            debug!(tenant = %tenant, token = %id, "rejected credential: token has no secret");
            return Err(Error::InvalidToken);
        };
        if !verify_secret(&credential.secret, hash) {
            debug!(tenant = %tenant, token = %id, "rejected credential: secret mismatch");
            return Err(Error::InvalidToken);
        }
        if token.is_revoked() {
            debug!(tenant = %tenant, token = %id, "rejected credential: revoked");
            return Err(Error::InvalidToken);
        }

        trace!(tenant = %tenant, token = %id, scope = %token.scope, "resolved token");
        Ok(token.into())
    }

    /// Resolve the active token a registered user holds on exactly one of
    /// `event` or `calendar`, for first-party authenticated flows.
    pub fn resolve_for_user(
        &self,
        user: UserId,
        tenant: TenantId,
        event: Option<EventId>,
        calendar: Option<CalendarId>,
    ) -> Result<ResolvedToken> {
        let scope = match (event, calendar) {
            (Some(_), Some(_)) => return Err(Error::InvalidParameterCombination),
            (None, None) => return Err(Error::MissingRequiredParameter),
            (Some(event), None) => TokenScope::Event(event),
            (None, Some(calendar)) => TokenScope::Calendar(calendar),
        };

        match self.store.find_active_for_user(tenant, user, scope)? {
            Some(token) => {
                trace!(tenant = %tenant, token = %token.id, user = %user, "resolved token for user");
                Ok(token.into())
            }
            None => {
                debug!(tenant = %tenant, user = %user, scope = %scope, "no active token for user");
                Err(Error::InvalidToken)
            }
        }
    }

    /// Like [`Verifier::resolve`], but an invalid credential becomes
    /// [`Access::Denied`] instead of an error. Only storage failures error.
    pub fn authorize(&self, bearer: &str, tenant: TenantId) -> Result<Access> {
        into_access(self.resolve(bearer, tenant))
    }

    /// Like [`Verifier::resolve_for_user`], with a missing token reported as
    /// [`Access::Denied`]. Parameter errors are still raised.
    pub fn authorize_user(
        &self,
        user: UserId,
        tenant: TenantId,
        event: Option<EventId>,
        calendar: Option<CalendarId>,
    ) -> Result<Access> {
        into_access(self.resolve_for_user(user, tenant, event, calendar))
    }
}

fn into_access(resolved: Result<ResolvedToken>) -> Result<Access> {
    match resolved {
        Ok(token) => Ok(Access::Granted(token)),
        Err(Error::InvalidToken) => Ok(Access::Denied(DenyReason::InvalidToken)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{ExternalIdentity, encode_bearer};
    use policy::{Capability, ExternalAttendeeId};

    const TENANT: TenantId = TenantId(1);

    #[test]
    fn test_resolve_valid_bearer() {
        let store = TokenStore::in_memory().unwrap();
        let issued = store
            .issue_attendee_token(TENANT, UserId(1), EventId(5), None)
            .unwrap();
        let token = Verifier::new(&store)
            .resolve(&issued.bearer().unwrap(), TENANT)
            .unwrap();
        assert_eq!(token.id(), issued.token.id);
        assert_eq!(token.scope(), TokenScope::Event(EventId(5)));
    }

    #[test]
    fn test_every_failure_is_invalid_token() {
        let store = TokenStore::in_memory().unwrap();
        let verifier = Verifier::new(&store);
        let issued = store
            .issue_attendee_token(TENANT, UserId(1), EventId(5), None)
            .unwrap();
        let bearer = issued.bearer().unwrap();

        let cases = [
            ("garbage".to_string(), TENANT),
            (bearer.clone(), TenantId(2)),
            (encode_bearer(issued.token.id, "wrong"), TENANT),
            (encode_bearer(storage::TokenId::new(), "whatever"), TENANT),
        ];
        for (value, tenant) in cases {
            assert!(matches!(
                verifier.resolve(&value, tenant),
                Err(Error::InvalidToken)
            ));
        }
    }

    #[test]
    fn test_resolve_decoded_credential() {
        let store = TokenStore::in_memory().unwrap();
        let issued = store
            .issue_attendee_token(TENANT, UserId(1), EventId(5), None)
            .unwrap();
        let verifier = Verifier::new(&store);

        let valid = Credential {
            token_id: issued.token.id,
            secret: issued.secret.clone().unwrap(),
        };
        let token = verifier.resolve_credential(&valid, TENANT).unwrap();
        assert_eq!(token.id(), issued.token.id);

        let wrong = Credential {
            token_id: issued.token.id,
            secret: "not-the-secret".to_string(),
        };
        assert!(matches!(
            verifier.resolve_credential(&wrong, TENANT),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn test_revoked_token_is_invalid() {
        let store = TokenStore::in_memory().unwrap();
        let issued = store
            .issue_external_update_token(
                TENANT,
                ExternalIdentity::new(ExternalAttendeeId(1), "a@example.com"),
                EventId(5),
                None,
            )
            .unwrap();
        let bearer = issued.bearer().unwrap();
        store.revoke(TENANT, issued.token.id).unwrap();
        assert!(matches!(
            Verifier::new(&store).resolve(&bearer, TENANT),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn test_secretless_owner_token_cannot_be_used_as_bearer() {
        let store = TokenStore::in_memory().unwrap();
        let issued = store
            .issue_owner_token(TENANT, UserId(1), CalendarId(10), None)
            .unwrap();
        let forged = encode_bearer(issued.token.id, "anything");
        assert!(matches!(
            Verifier::new(&store).resolve(&forged, TENANT),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn test_resolve_for_user_parameter_errors() {
        let store = TokenStore::in_memory().unwrap();
        let verifier = Verifier::new(&store);
        assert!(matches!(
            verifier.resolve_for_user(UserId(1), TENANT, Some(EventId(1)), Some(CalendarId(1))),
            Err(Error::InvalidParameterCombination)
        ));
        assert!(matches!(
            verifier.resolve_for_user(UserId(1), TENANT, None, None),
            Err(Error::MissingRequiredParameter)
        ));
        assert!(matches!(
            verifier.authorize_user(UserId(1), TENANT, None, None),
            Err(Error::MissingRequiredParameter)
        ));
    }

    #[test]
    fn test_resolve_for_user() {
        let store = TokenStore::in_memory().unwrap();
        store
            .issue_owner_token(TENANT, UserId(1), CalendarId(10), None)
            .unwrap();
        let verifier = Verifier::new(&store);

        let token = verifier
            .resolve_for_user(UserId(1), TENANT, None, Some(CalendarId(10)))
            .unwrap();
        assert!(token.has(Capability::Create));

        assert!(matches!(
            verifier.resolve_for_user(UserId(2), TENANT, None, Some(CalendarId(10))),
            Err(Error::InvalidToken)
        ));
        assert!(matches!(
            verifier.resolve_for_user(UserId(1), TENANT, Some(EventId(10)), None),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn test_authorize_turns_invalid_token_into_denial() {
        let store = TokenStore::in_memory().unwrap();
        let verifier = Verifier::new(&store);
        assert_eq!(
            verifier.authorize("garbage", TENANT).unwrap(),
            Access::Denied(DenyReason::InvalidToken)
        );
        assert_eq!(
            verifier
                .authorize_user(UserId(1), TENANT, Some(EventId(1)), None)
                .unwrap(),
            Access::Denied(DenyReason::InvalidToken)
        );
    }
}
