//! Calendar management authorization engine.
//!
//! Resolves bearer credentials (or first-party user identities) to tokens and
//! decides whether the resolved token may mutate an event or create one on a
//! calendar.
//!
//! # Overview
//!
//! - **Verifier**: decodes `base64(token_id ":" secret)`, looks the token up
//!   within the request's tenant, checks the secret in constant time and
//!   rejects revoked tokens. Every failure is the same [`Error::InvalidToken`].
//! - **ResolvedToken**: an immutable snapshot of a verified token, threaded
//!   explicitly through each decision.
//! - **Access**: the deny-as-value form of resolution. Decisions on an
//!   [`Access`] return plain booleans, so a rejected credential reads as a
//!   denial rather than a failure.
//!
//! # Example
//!
//! ```ignore
//! use access::Verifier;
//! use policy::TenantId;
//! use storage::TokenStore;
//!
//! let store = TokenStore::open("tokens.db")?;
//! let access = Verifier::new(&store).authorize(bearer, TenantId(1))?;
//! if !access.can_perform_update(&old_event, Some(&new_event)) {
//!     return Err(Forbidden);
//! }
//! ```

mod decision;
mod error;
mod resolved;
mod verifier;

pub use decision::{Access, DenyReason};
pub use error::{Error, Result};
pub use resolved::{ResolvedToken, TokenActor};
pub use verifier::Verifier;
