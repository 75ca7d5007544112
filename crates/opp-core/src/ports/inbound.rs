//! Inbound Ports (Driving Ports)
//!
//! The API a voltage monitoring agent drives.

use shared_bus::{EventFilter, Subscription};
use shared_types::{DeviceId, Hertz, MicroVolt};

use super::outbound::SharedOppObserver;
use crate::error::AdjustError;

/// Outcome of a request that found its entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The entry already had the requested value; no observer ran.
    Unchanged,
    /// The entry was updated and every observer has seen the change.
    Changed,
}

impl ChangeOutcome {
    pub fn is_changed(self) -> bool {
        matches!(self, ChangeOutcome::Changed)
    }
}

/// Primary OPP voltage API (Driving Port)
pub trait OppVoltageApi: Send + Sync {
    /// Replace the voltage triplet of the OPP at `frequency`.
    ///
    /// An entry whose target already equals `target` is left alone and
    /// `Unchanged` is returned. Otherwise all three values are stored,
    /// observers receive [`OppEvent::AdjustVoltage`](shared_bus::OppEvent)
    /// and `Changed` is returned once they have all run.
    ///
    /// # Errors
    /// * `DeviceNotFound` - no table is registered for `device`
    /// * `FrequencyNotFound` - the table has no OPP at `frequency`
    fn adjust_voltage(
        &self,
        device: &DeviceId,
        frequency: Hertz,
        target: MicroVolt,
        min: MicroVolt,
        max: MicroVolt,
    ) -> Result<ChangeOutcome, AdjustError>;

    /// Make the OPP at `frequency` available again.
    fn enable_opp(&self, device: &DeviceId, frequency: Hertz)
        -> Result<ChangeOutcome, AdjustError>;

    /// Withdraw the OPP at `frequency` from selection.
    fn disable_opp(
        &self,
        device: &DeviceId,
        frequency: Hertz,
    ) -> Result<ChangeOutcome, AdjustError>;

    /// Register an observer on the table of `device`.
    fn subscribe_shared(
        &self,
        device: &DeviceId,
        filter: EventFilter,
        observer: SharedOppObserver,
    ) -> Result<Subscription, AdjustError>;
}
