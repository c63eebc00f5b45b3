use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fine-grained event management capabilities a token can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Create,
    UpdateAttendees,
    UpdateDetails,
    Reschedule,
    Cancel,
    UpdateSelfRsvp,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Create,
        Capability::UpdateAttendees,
        Capability::UpdateDetails,
        Capability::Reschedule,
        Capability::Cancel,
        Capability::UpdateSelfRsvp,
    ];

    /// Stable storage and wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Create => "create",
            Capability::UpdateAttendees => "update_attendees",
            Capability::UpdateDetails => "update_details",
            Capability::Reschedule => "reschedule",
            Capability::Cancel => "cancel",
            Capability::UpdateSelfRsvp => "update_self_rsvp",
        }
    }

    /// Capabilities that also satisfy a check for `self`, besides `self`.
    pub fn subsumed_by(self) -> &'static [Capability] {
        SUBSUMPTIONS
            .iter()
            .find(|(cap, _)| *cap == self)
            .map(|(_, by)| *by)
            .unwrap_or(&[])
    }
}

/// `(capability, capabilities that satisfy it)`.
///
/// One-directional: managing all attendees covers managing your own RSVP,
/// never the other way around.
const SUBSUMPTIONS: &[(Capability, &[Capability])] =
    &[(Capability::UpdateSelfRsvp, &[Capability::UpdateAttendees])];

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownCapability(s.to_string()))
    }
}

/// An ordered set of capabilities.
///
/// Keeps the order in which capabilities were first inserted; duplicates
/// collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct CapabilitySet(Vec<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a capability. Returns `false` if it was already present.
    pub fn insert(&mut self, capability: Capability) -> bool {
        if self.0.contains(&capability) {
            return false;
        }
        self.0.push(capability);
        true
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Whether holding this set passes a check for `capability`, directly or
    /// through a subsumption rule.
    pub fn satisfies(&self, capability: Capability) -> bool {
        self.contains(capability)
            || capability
                .subsumed_by()
                .iter()
                .any(|by| self.contains(*by))
    }

    /// Whether every capability in `required` is satisfied.
    pub fn satisfies_all(&self, required: &CapabilitySet) -> bool {
        required.iter().all(|c| self.satisfies(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Capability] {
        &self.0
    }

    /// Parse a list of capability names, e.g. from CLI flags or config.
    pub fn parse_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::new();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(value: Vec<Capability>) -> Self {
        value.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(value: CapabilitySet) -> Self {
        value.0
    }
}

impl<const N: usize> From<[Capability; N]> for CapabilitySet {
    fn from(value: [Capability; N]) -> Self {
        value.into_iter().collect()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|c| c.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
