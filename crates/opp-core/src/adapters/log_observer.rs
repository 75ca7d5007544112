//! Observer that records every table event through `tracing`.

use shared_bus::{Observer, OppEvent};
use shared_types::DeviceId;
use tracing::info;

use crate::domain::OppRef;

/// Logs each event at `info` level with the entry's current state.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    device: DeviceId,
}

impl TracingObserver {
    pub fn new(device: DeviceId) -> Self {
        Self { device }
    }
}

impl Observer<OppRef> for TracingObserver {
    fn on_event(&self, event: OppEvent, opp: &OppRef) {
        let snapshot = opp.snapshot();
        info!(
            device = %self.device,
            event = %event,
            frequency = %snapshot.frequency,
            voltages = %snapshot.voltages,
            available = snapshot.available,
            listed = opp.is_listed(),
            "OPP event"
        );
    }
}
