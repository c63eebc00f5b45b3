//! Deny-as-value authorization results.

use crate::resolved::{ResolvedToken, can_perform_scheduling};
use crate::{Error, Result};
use policy::{CalendarId, CalendarSettings, Capability, CapabilitySet, EventSnapshot, ProposedEvent};

/// Why a credential did not resolve. There is only one public reason so
/// callers cannot probe which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InvalidToken,
}

/// Outcome of resolving a caller's credential for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No credential was presented.
    Anonymous,
    /// A credential was presented and rejected.
    Denied(DenyReason),
    Granted(ResolvedToken),
}

impl Access {
    pub fn token(&self) -> Option<&ResolvedToken> {
        match self {
            Access::Granted(token) => Some(token),
            Access::Anonymous | Access::Denied(_) => None,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }

    fn require_token(&self) -> Result<&ResolvedToken> {
        self.token().ok_or(Error::ServiceNotInitialized)
    }

    /// Capability check. Fails with [`Error::ServiceNotInitialized`] when no
    /// token was resolved.
    pub fn has(&self, capability: Capability) -> Result<bool> {
        Ok(self.require_token()?.has(capability))
    }

    pub fn required_capabilities(
        &self,
        old: &EventSnapshot,
        new: Option<&EventSnapshot>,
    ) -> Result<CapabilitySet> {
        Ok(self.require_token()?.required_capabilities(old, new))
    }

    /// Update decision. Unresolved access is always denied.
    pub fn can_perform_update(&self, old: &EventSnapshot, new: Option<&EventSnapshot>) -> bool {
        self.token()
            .is_some_and(|token| token.can_perform_update(old, new))
    }

    /// Creation decision. Public calendars accept anyone, including
    /// anonymous and denied callers.
    pub fn can_perform_scheduling(
        &self,
        calendar: CalendarId,
        settings: &CalendarSettings,
        proposed: &ProposedEvent,
    ) -> bool {
        can_perform_scheduling(self.token(), calendar, settings, proposed)
    }
}

impl From<ResolvedToken> for Access {
    fn from(token: ResolvedToken) -> Self {
        Access::Granted(token)
    }
}
