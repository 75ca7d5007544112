//! Error types for the OPP core

use shared_types::{DeviceId, Hertz};
use thiserror::Error;

/// Errors returned by the voltage adjustment operations.
///
/// Both variants are expected outcomes (for example a caller racing with
/// table removal), not failures of the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjustError {
    #[error("No OPP table registered for device {device}")]
    DeviceNotFound { device: DeviceId },

    #[error("Device {device} has no OPP at {frequency}")]
    FrequencyNotFound { device: DeviceId, frequency: Hertz },
}

/// Errors from the table registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No OPP table registered for device {0}")]
    DeviceNotFound(DeviceId),

    #[error("Device {0} already has an OPP table")]
    AlreadyRegistered(DeviceId),
}

/// Errors from structural table changes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Device {device} already has an OPP at {frequency}")]
    DuplicateFrequency { device: DeviceId, frequency: Hertz },

    #[error("OPP table of device {device} has been unregistered")]
    Detached { device: DeviceId },
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Event stream capacity must be greater than zero")]
    ZeroStreamCapacity,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Errors from the async event stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Every sender is gone.
    #[error("Event stream closed")]
    Closed,
}
