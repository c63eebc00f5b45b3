//! SQLite-backed storage for calendar management tokens.
//!
//! This crate owns the durable record of every token ever issued: its scope,
//! the identity it is bound to, the hash of its bearer secret, its revocation
//! state and its capability set.
//!
//! # Overview
//!
//! ## TokenStore
//!
//! The [`TokenStore`] wraps a SQLite database. It exposes the four issuance
//! recipes (owner, attendee, external update, external schedule), revocation,
//! and tenant-scoped lookups. Issuance is idempotent on
//! `(tenant, scope, subject)`: re-issuing replaces the capability set of the
//! active token instead of creating a second one.
//!
//! ## ManagementToken
//!
//! A [`ManagementToken`] is scoped to exactly one calendar or one event
//! ([`TokenScope`]) and optionally bound to a [`Subject`]. Tokens are never
//! deleted; revocation is permanent.
//!
//! ## Credentials
//!
//! The plaintext secret exists only in the [`IssuedToken`] returned by
//! issuance. Callers present it back as a bearer credential, see
//! [`encode_bearer`] and [`decode_bearer`].
//!
//! # Example
//!
//! ```no_run
//! use policy::{EventId, TenantId, UserId};
//! use storage::TokenStore;
//!
//! let store = TokenStore::open("tokens.db")?;
//! let issued = store.issue_attendee_token(TenantId(1), UserId(7), EventId(42), None)?;
//! println!("bearer: {}", issued.bearer().unwrap_or_default());
//!
//! store.revoke(TenantId(1), issued.token.id)?;
//! # Ok::<(), storage::Error>(())
//! ```

mod credential;
mod error;
mod secret;
mod store;
mod token;

pub use credential::{Credential, decode_bearer, encode_bearer};
pub use error::{Error, Result};
pub use secret::{generate_secret, hash_secret, verify_secret};
pub use store::TokenStore;
pub use token::{ExternalIdentity, IssuedToken, ManagementToken, Subject, TokenId, TokenScope};
