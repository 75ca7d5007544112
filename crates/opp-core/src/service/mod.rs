//! Service Layer
//!
//! `VoltageAdjuster` implements `OppVoltageApi` on top of the registry.

mod voltage_adjuster;

#[cfg(test)]
mod tests;

pub use voltage_adjuster::VoltageAdjuster;
