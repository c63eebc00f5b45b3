//! Mutation diff analysis.
//!
//! Computes the minimal set of capabilities needed to move an event from one
//! state to another. Every function here is pure; the caller supplies the
//! acting identity explicitly.

use crate::{Capability, CapabilitySet, EventSnapshot, ExternalAttendee, InternalAttendee, UserId};
use std::collections::HashSet;

/// Who is performing the mutation, as far as self-service rules care.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user: Option<UserId>,
    /// Stored lowercased.
    external_email: Option<String>,
}

impl Actor {
    /// An actor with no bound identity; every removal counts as "other".
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user: UserId) -> Self {
        Self {
            user: Some(user),
            external_email: None,
        }
    }

    pub fn external(email: &str) -> Self {
        Self {
            user: None,
            external_email: Some(email.to_lowercase()),
        }
    }

    pub fn external_email(&self) -> Option<&str> {
        self.external_email.as_deref()
    }
}

/// Capabilities required to apply `new` over `old`.
///
/// `new = None` means the event is being deleted, which needs exactly
/// [`Capability::Cancel`] no matter what else differs.
pub fn required_capabilities(
    old: &EventSnapshot,
    new: Option<&EventSnapshot>,
    actor: &Actor,
) -> CapabilitySet {
    let Some(new) = new else {
        return CapabilitySet::from([Capability::Cancel]);
    };

    let mut required = attendance_capabilities(
        &old.attendees,
        &old.external_attendees,
        &new.attendees,
        &new.external_attendees,
        actor,
    );

    if let Some(cap) = details_capability(old, new) {
        required.insert(cap);
    }
    if let Some(cap) = schedule_capability(old, new) {
        required.insert(cap);
    }

    required
}

/// Capabilities needed for changes in who attends.
///
/// Additions always need [`Capability::UpdateAttendees`]. Removing the actor
/// themself needs only [`Capability::UpdateSelfRsvp`]; removing anyone else
/// needs [`Capability::UpdateAttendees`]. External attendees are matched by
/// email, case-insensitively. RSVP status and name changes are ignored.
pub fn attendance_capabilities(
    old_internal: &[InternalAttendee],
    old_external: &[ExternalAttendee],
    new_internal: &[InternalAttendee],
    new_external: &[ExternalAttendee],
    actor: &Actor,
) -> CapabilitySet {
    let mut required = CapabilitySet::new();

    let old_ids: HashSet<UserId> = old_internal.iter().map(|a| a.user_id).collect();
    let new_ids: HashSet<UserId> = new_internal.iter().map(|a| a.user_id).collect();

    if new_ids.difference(&old_ids).next().is_some() {
        required.insert(Capability::UpdateAttendees);
    }
    for removed in old_ids.difference(&new_ids) {
        if actor.user == Some(*removed) {
            required.insert(Capability::UpdateSelfRsvp);
        } else {
            required.insert(Capability::UpdateAttendees);
        }
    }

    let old_emails = email_keys(old_external);
    let new_emails = email_keys(new_external);

    if new_emails.difference(&old_emails).next().is_some() {
        required.insert(Capability::UpdateAttendees);
    }
    for removed in old_emails.difference(&new_emails) {
        if actor.external_email() == Some(removed.as_str()) {
            required.insert(Capability::UpdateSelfRsvp);
        } else {
            required.insert(Capability::UpdateAttendees);
        }
    }

    required
}

/// [`Capability::UpdateDetails`] if the title or description changed.
pub fn details_capability(old: &EventSnapshot, new: &EventSnapshot) -> Option<Capability> {
    (old.title != new.title || old.description != new.description)
        .then_some(Capability::UpdateDetails)
}

/// [`Capability::Reschedule`] if the start or end time moved.
pub fn schedule_capability(old: &EventSnapshot, new: &EventSnapshot) -> Option<Capability> {
    (old.start_time != new.start_time || old.end_time != new.end_time)
        .then_some(Capability::Reschedule)
}

fn email_keys(attendees: &[ExternalAttendee]) -> HashSet<String> {
    attendees.iter().map(|a| a.email.to_lowercase()).collect()
}
