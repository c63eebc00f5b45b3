//! Resolved tokens and the decisions made against them.

use policy::{
    Actor, CalendarId, CalendarSettings, Capability, CapabilitySet, EventSnapshot, ProposedEvent,
    TenantId, required_capabilities,
};
use storage::{ExternalIdentity, ManagementToken, Subject, TokenId, TokenScope};
use tracing::{debug, trace};

/// An immutable, verified view of a token, valid for one authorization
/// decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    id: TokenId,
    tenant: TenantId,
    scope: TokenScope,
    subject: Option<Subject>,
    capabilities: CapabilitySet,
}

/// Who a mutation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenActor {
    User(policy::UserId),
    ExternalAttendee(ExternalIdentity),
    /// Anonymous token holder.
    Token(TokenId),
}

impl From<ManagementToken> for ResolvedToken {
    fn from(token: ManagementToken) -> Self {
        Self {
            id: token.id,
            tenant: token.tenant_id,
            scope: token.scope,
            subject: token.subject,
            capabilities: token.capabilities,
        }
    }
}

impl ResolvedToken {
    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn scope(&self) -> TokenScope {
        self.scope
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Whether the token holds `capability`, directly or by subsumption.
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.satisfies(capability)
    }

    pub fn actor(&self) -> TokenActor {
        match &self.subject {
            Some(Subject::User { id }) => TokenActor::User(*id),
            Some(Subject::ExternalAttendee(identity)) => {
                TokenActor::ExternalAttendee(identity.clone())
            }
            None => TokenActor::Token(self.id),
        }
    }

    /// The identity self-service diff rules compare against.
    pub fn diff_actor(&self) -> Actor {
        match &self.subject {
            Some(Subject::User { id }) => Actor::user(*id),
            Some(Subject::ExternalAttendee(identity)) => Actor::external(&identity.email),
            None => Actor::anonymous(),
        }
    }

    /// Whether the token's fixed scope covers `event`.
    ///
    /// Event-scoped tokens cover only their own event. Calendar-scoped tokens
    /// cover every event on their calendar.
    pub fn covers(&self, event: &EventSnapshot) -> bool {
        match self.scope {
            TokenScope::Event(id) => id == event.id,
            TokenScope::Calendar(id) => id == event.calendar_id,
        }
    }

    pub fn required_capabilities(
        &self,
        old: &EventSnapshot,
        new: Option<&EventSnapshot>,
    ) -> CapabilitySet {
        required_capabilities(old, new, &self.diff_actor())
    }

    /// Whether this token may move `old` to `new` (`None` cancels the event).
    ///
    /// The new state must be the same event and stay within the token's
    /// scope, so an update cannot carry an event off to another calendar.
    pub fn can_perform_update(&self, old: &EventSnapshot, new: Option<&EventSnapshot>) -> bool {
        if !self.covers(old) {
            debug!(token = %self.id, scope = %self.scope, event = %old.id, "token scope does not cover event");
            return false;
        }
        if let Some(new) = new
            && (new.id != old.id || !self.covers(new))
        {
            debug!(
                token = %self.id,
                scope = %self.scope,
                event = %old.id,
                new_event = %new.id,
                new_calendar = %new.calendar_id,
                "update denied: new state leaves token scope"
            );
            return false;
        }

        let required = self.required_capabilities(old, new);
        let allowed = self.capabilities.satisfies_all(&required);
        if allowed {
            trace!(token = %self.id, event = %old.id, %required, "update allowed");
        } else {
            debug!(
                token = %self.id,
                event = %old.id,
                %required,
                held = %self.capabilities,
                "update denied: missing capability"
            );
        }
        allowed
    }

    /// Whether this token may create an event on `calendar`, ignoring public
    /// scheduling.
    pub fn can_create_on(&self, calendar: CalendarId) -> bool {
        self.scope == TokenScope::Calendar(calendar) && self.has(Capability::Create)
    }
}

/// Scheduling decision shared by tokened and anonymous callers.
pub(crate) fn can_perform_scheduling(
    token: Option<&ResolvedToken>,
    calendar: CalendarId,
    settings: &CalendarSettings,
    _proposed: &ProposedEvent,
) -> bool {
    if settings.accepts_public_scheduling {
        return true;
    }
    match token {
        Some(token) => {
            let allowed = token.can_create_on(calendar);
            if !allowed {
                debug!(token = %token.id, scope = %token.scope, calendar = %calendar, "scheduling denied");
            }
            allowed
        }
        None => false,
    }
}
