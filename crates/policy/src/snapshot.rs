//! Read-only event state supplied by the event-management layer.

use crate::{CalendarId, EventId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Accepted,
    Declined,
    #[default]
    Pending,
}

/// An attendee with a platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalAttendee {
    pub user_id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: RsvpStatus,
}

impl InternalAttendee {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            email: String::new(),
            name: None,
            status: RsvpStatus::Pending,
        }
    }
}

/// An attendee known only by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAttendee {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: RsvpStatus,
}

impl ExternalAttendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            status: RsvpStatus::Pending,
        }
    }
}

/// State of an existing event, before or after a proposed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: EventId,
    pub calendar_id: CalendarId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<InternalAttendee>,
    #[serde(default)]
    pub external_attendees: Vec<ExternalAttendee>,
}

/// A new event requested on a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// IANA timezone name.
    pub timezone: String,
    #[serde(default)]
    pub attendees: Vec<InternalAttendee>,
    #[serde(default)]
    pub external_attendees: Vec<ExternalAttendee>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalendarSettings {
    /// Anyone may book on this calendar, no token required.
    #[serde(default)]
    pub accepts_public_scheduling: bool,
}
