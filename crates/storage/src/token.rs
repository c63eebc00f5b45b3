//! Management token records.

use chrono::{DateTime, Utc};
use policy::{CalendarId, CapabilitySet, EventId, ExternalAttendeeId, TenantId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque token identifier, unique within its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The single resource a token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    /// Gates event creation on the calendar and updates to any of its events.
    Calendar(CalendarId),
    /// Gates updates to one event.
    Event(EventId),
}

impl TokenScope {
    pub fn calendar_id(&self) -> Option<CalendarId> {
        match self {
            TokenScope::Calendar(id) => Some(*id),
            TokenScope::Event(_) => None,
        }
    }

    pub fn event_id(&self) -> Option<EventId> {
        match self {
            TokenScope::Event(id) => Some(*id),
            TokenScope::Calendar(_) => None,
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenScope::Calendar(id) => write!(f, "calendar:{id}"),
            TokenScope::Event(id) => write!(f, "event:{id}"),
        }
    }
}

/// An attendee without a platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub id: ExternalAttendeeId,
    pub email: String,
}

impl ExternalIdentity {
    pub fn new(id: ExternalAttendeeId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Identity a token is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    User { id: UserId },
    ExternalAttendee(ExternalIdentity),
}

impl Subject {
    pub fn user(id: UserId) -> Self {
        Subject::User { id }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Subject::User { id } => Some(*id),
            Subject::ExternalAttendee(_) => None,
        }
    }

    pub fn external(&self) -> Option<&ExternalIdentity> {
        match self {
            Subject::ExternalAttendee(identity) => Some(identity),
            Subject::User { .. } => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User { id } => write!(f, "user:{id}"),
            Subject::ExternalAttendee(identity) => write!(f, "external:{}", identity.id),
        }
    }
}

/// A single grant of capabilities over a calendar or an event.
///
/// Tokens are never deleted. Once `revoked_at` is set the token is unusable
/// forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagementToken {
    pub id: TokenId,
    pub tenant_id: TenantId,
    pub scope: TokenScope,
    pub subject: Option<Subject>,
    /// Hex SHA-256 of the bearer secret. `None` for owner tokens, which are
    /// only reachable through the first-party user lookup.
    #[serde(skip)]
    pub secret_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub capabilities: CapabilitySet,
}

impl ManagementToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.subject.as_ref().and_then(Subject::user_id)
    }

    pub fn external_attendee(&self) -> Option<&ExternalIdentity> {
        self.subject.as_ref().and_then(Subject::external)
    }
}

/// A token as returned from issuance, carrying the plaintext secret.
///
/// This is the only place the plaintext ever exists; it is not stored.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: ManagementToken,
    pub secret: Option<String>,
}

impl IssuedToken {
    /// The encoded bearer credential, if the token has a secret.
    pub fn bearer(&self) -> Option<String> {
        self.secret
            .as_deref()
            .map(|secret| crate::encode_bearer(self.token.id, secret))
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &self.token)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
