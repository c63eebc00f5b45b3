//! Capability vocabulary and mutation diffing for calendar management tokens.
//!
//! Core principle: **every change to an event maps to an explicit capability.**
//!
//! This crate has no I/O. It defines which capabilities exist, which default
//! bundles each role receives, how one capability may satisfy another, and
//! which capabilities a given event mutation requires.

mod bundle;
mod capability;
pub mod diff;
mod error;
mod ids;
mod snapshot;

pub use bundle::{
    Bundles, attendee_bundle, external_attendee_bundle, external_schedule_bundle, owner_bundle,
};
pub use capability::{Capability, CapabilitySet};
pub use diff::{Actor, required_capabilities};
pub use error::{Error, Result};
pub use ids::{CalendarId, EventId, ExternalAttendeeId, TenantId, UserId};
pub use snapshot::{
    CalendarSettings, EventSnapshot, ExternalAttendee, InternalAttendee, ProposedEvent, RsvpStatus,
};
