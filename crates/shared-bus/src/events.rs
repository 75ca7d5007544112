//! # OPP Events
//!
//! The event kinds a table publishes and the filter observers use to pick
//! the ones they care about.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything that can happen to an OPP entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OppEvent {
    /// An entry was added to its table.
    Add,
    /// An entry left its table. The payload reference is still readable.
    Remove,
    /// An entry became available for selection.
    Enable,
    /// An entry was withdrawn from selection.
    Disable,
    /// The voltage triplet of an entry changed.
    AdjustVoltage,
}

impl OppEvent {
    /// All event kinds, in declaration order.
    pub const ALL: [OppEvent; 5] = [
        OppEvent::Add,
        OppEvent::Remove,
        OppEvent::Enable,
        OppEvent::Disable,
        OppEvent::AdjustVoltage,
    ];

    /// Stable lowercase name, used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OppEvent::Add => "add",
            OppEvent::Remove => "remove",
            OppEvent::Enable => "enable",
            OppEvent::Disable => "disable",
            OppEvent::AdjustVoltage => "adjust_voltage",
        }
    }
}

impl fmt::Display for OppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filter for observer registrations.
///
/// An empty event list accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Event kinds to deliver. Empty means all kinds.
    pub events: Vec<OppEvent>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific event kinds.
    #[must_use]
    pub fn events(events: Vec<OppEvent>) -> Self {
        Self { events }
    }

    /// Check if an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: OppEvent) -> bool {
        self.events.is_empty() || self.events.contains(&event)
    }
}
