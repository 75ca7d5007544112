//! # Core Entities
//!
//! Device identifiers and the units an Operating Performance Point is
//! described in.
//!
//! ## Clusters
//!
//! - **Identity**: `DeviceId`
//! - **Units**: `Hertz`, `MicroVolt`
//! - **Supply**: `Voltages`

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Identifier of a device owning an OPP table (e.g. `"cpu0"`, `"gpu"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// =============================================================================
// CLUSTER B: UNITS
// =============================================================================

/// A frequency in hertz.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Hertz(pub u64);

impl Hertz {
    /// Build from kilohertz.
    #[must_use]
    pub const fn from_khz(khz: u64) -> Self {
        Self(khz * 1_000)
    }

    /// Build from megahertz.
    #[must_use]
    pub const fn from_mhz(mhz: u64) -> Self {
        Self(mhz * 1_000_000)
    }

    /// Raw value in hertz.
    #[must_use]
    pub const fn as_hz(self) -> u64 {
        self.0
    }
}

impl From<u64> for Hertz {
    fn from(hz: u64) -> Self {
        Self(hz)
    }
}

impl fmt::Display for Hertz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// A voltage in microvolts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MicroVolt(pub u64);

impl MicroVolt {
    /// Raw value in microvolts.
    #[must_use]
    pub const fn as_uv(self) -> u64 {
        self.0
    }

    /// Add a signed step, clamping at zero.
    #[must_use]
    pub const fn saturating_offset(self, step: i64) -> Self {
        if step < 0 {
            Self(self.0.saturating_sub(step.unsigned_abs()))
        } else {
            Self(self.0.saturating_add(step as u64))
        }
    }
}

impl From<u64> for MicroVolt {
    fn from(uv: u64) -> Self {
        Self(uv)
    }
}

impl fmt::Display for MicroVolt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} uV", self.0)
    }
}

// =============================================================================
// CLUSTER C: SUPPLY
// =============================================================================

/// The voltage triplet attached to an OPP.
///
/// No ordering between the three values is enforced; range checks belong to
/// whoever talks to the regulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Voltages {
    /// Voltage the regulator should be programmed to.
    pub target: MicroVolt,
    /// Lowest acceptable voltage.
    pub min: MicroVolt,
    /// Highest acceptable voltage.
    pub max: MicroVolt,
}

impl Voltages {
    /// Build a triplet from raw microvolt values.
    #[must_use]
    pub const fn new(target: u64, min: u64, max: u64) -> Self {
        Self {
            target: MicroVolt(target),
            min: MicroVolt(min),
            max: MicroVolt(max),
        }
    }

    /// A triplet where all three values are the same.
    #[must_use]
    pub const fn exact(uv: u64) -> Self {
        Self::new(uv, uv, uv)
    }
}

impl fmt::Display for Voltages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} .. {}]", self.target.0, self.min.0, self.max.0)
    }
}
