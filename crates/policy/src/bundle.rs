//! Default capability bundles per actor role.

use crate::{Capability, CapabilitySet, Error, Result};
use serde::{Deserialize, Serialize};

/// Capabilities granted when an issuance caller does not supply its own set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundles {
    /// Calendar administrators.
    #[serde(default = "owner_bundle")]
    pub owner: CapabilitySet,

    /// Registered users attending an event.
    #[serde(default = "attendee_bundle")]
    pub attendee: CapabilitySet,

    /// Attendees invited by email only.
    #[serde(default = "external_attendee_bundle")]
    pub external_attendee: CapabilitySet,
}

pub fn owner_bundle() -> CapabilitySet {
    CapabilitySet::from([
        Capability::Create,
        Capability::UpdateAttendees,
        Capability::UpdateDetails,
        Capability::Reschedule,
        Capability::Cancel,
    ])
}

pub fn attendee_bundle() -> CapabilitySet {
    CapabilitySet::from([
        Capability::UpdateAttendees,
        Capability::UpdateDetails,
        Capability::Reschedule,
        Capability::Cancel,
    ])
}

pub fn external_attendee_bundle() -> CapabilitySet {
    CapabilitySet::from([
        Capability::UpdateSelfRsvp,
        Capability::Reschedule,
        Capability::Cancel,
    ])
}

/// The only capability an external scheduling token ever carries.
pub fn external_schedule_bundle() -> CapabilitySet {
    CapabilitySet::from([Capability::Create])
}

impl Default for Bundles {
    fn default() -> Self {
        Self {
            owner: owner_bundle(),
            attendee: attendee_bundle(),
            external_attendee: external_attendee_bundle(),
        }
    }
}

impl Bundles {
    /// Parse bundles from a TOML string. Missing keys fall back to defaults.
    pub fn parse(toml: &str) -> Result<Self> {
        let bundles: Self = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        bundles.validate()?;
        Ok(bundles)
    }

    /// Reject bundles that would issue zero-capability tokens.
    pub fn validate(&self) -> Result<()> {
        for (name, set) in [
            ("owner", &self.owner),
            ("attendee", &self.attendee),
            ("external_attendee", &self.external_attendee),
        ] {
            if set.is_empty() {
                return Err(Error::Invalid(format!("{name} bundle must not be empty")));
            }
        }
        Ok(())
    }
}
