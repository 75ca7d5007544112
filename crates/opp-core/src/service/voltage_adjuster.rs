//! Voltage Adjuster
//!
//! Orchestrates registry lookup, the locked compare-and-store on the table,
//! and the unlocked notification round.
//!
//! ```text
//! LookupTable ──✗──→ DeviceNotFound
//!     │
//! LookupEntry ──✗──→ FrequencyNotFound
//!     │
//! CompareVoltage ──=──→ Unchanged
//!     │
//! Mutate (retain) → unlock → Notify → release → Changed
//! ```

use shared_bus::{EventFilter, OppEvent, Subscription};
use shared_types::{DeviceId, Hertz, MicroVolt, Voltages};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::OppConfig;
use crate::domain::{OppRef, OppTable, OppTableGuard, TableHandle, TableRegistry};
use crate::error::AdjustError;
use crate::metrics::AdjustMetrics;
use crate::ports::{ChangeOutcome, OppObserver, OppVoltageApi, SharedOppObserver};

/// Where the locked phase ended.
enum LockedPhase {
    Missing,
    Unchanged,
    Changed(OppRef),
}

/// Implements [`OppVoltageApi`] over a [`TableRegistry`].
///
/// Holds no per-call state; concurrent calls only contend on the table they
/// target.
pub struct VoltageAdjuster {
    registry: Arc<TableRegistry>,
    config: OppConfig,
    metrics: Arc<AdjustMetrics>,
}

impl VoltageAdjuster {
    /// Create an adjuster with the default configuration.
    pub fn new(registry: Arc<TableRegistry>) -> Self {
        Self::with_config(registry, OppConfig::default())
    }

    /// Create an adjuster with a custom configuration.
    pub fn with_config(registry: Arc<TableRegistry>, config: OppConfig) -> Self {
        Self {
            registry,
            config,
            metrics: Arc::new(AdjustMetrics::new()),
        }
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &OppConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<AdjustMetrics> {
        &self.metrics
    }

    /// Register an observer for every event on the table of `device`.
    pub fn subscribe<O>(&self, device: &DeviceId, observer: O) -> Result<Subscription, AdjustError>
    where
        O: OppObserver + 'static,
    {
        let table = self.acquire(device)?;
        Ok(table.subscribe(observer))
    }

    /// Register an observer for the events accepted by `filter`.
    pub fn subscribe_filtered<O>(
        &self,
        device: &DeviceId,
        filter: EventFilter,
        observer: O,
    ) -> Result<Subscription, AdjustError>
    where
        O: OppObserver + 'static,
    {
        let table = self.acquire(device)?;
        Ok(table.subscribe_filtered(filter, observer))
    }

    fn acquire(&self, device: &DeviceId) -> Result<TableHandle, AdjustError> {
        self.registry
            .acquire(device)
            .map_err(|_| AdjustError::DeviceNotFound {
                device: device.clone(),
            })
    }

    /// Run one request through both phases.
    ///
    /// `update` runs with the table locked and reports whether it changed
    /// the entry. Observers run after the lock is gone.
    fn update_entry<F>(
        &self,
        device: &DeviceId,
        frequency: Hertz,
        event: OppEvent,
        update: F,
    ) -> Result<ChangeOutcome, AdjustError>
    where
        F: FnOnce(&OppTableGuard<'_>, &OppRef) -> bool,
    {
        self.metrics.record_request();
        let table = self.acquire(device).inspect_err(|_| {
            self.metrics.record_device_not_found();
        })?;

        let phase = {
            let guard = table.lock();
            let phase = match guard.find_by_frequency(frequency) {
                None => LockedPhase::Missing,
                Some(opp) => {
                    if update(&guard, opp) {
                        // Retained under the lock so a concurrent removal cannot free it.
                        LockedPhase::Changed(opp.retain())
                    } else {
                        LockedPhase::Unchanged
                    }
                }
            };
            phase
        };

        let outcome = match phase {
            LockedPhase::Missing => {
                self.metrics.record_frequency_not_found();
                trace!(device = %device, frequency = %frequency, "No OPP at requested frequency");
                Err(AdjustError::FrequencyNotFound {
                    device: device.clone(),
                    frequency,
                })
            }
            LockedPhase::Unchanged => {
                self.metrics.record_unchanged();
                trace!(device = %device, frequency = %frequency, event = %event, "OPP unchanged");
                Ok(ChangeOutcome::Unchanged)
            }
            LockedPhase::Changed(opp) => {
                match event {
                    OppEvent::AdjustVoltage => self.metrics.record_changed(),
                    _ => self.metrics.record_availability_change(),
                }
                debug!(
                    device = %device,
                    frequency = %frequency,
                    event = %event,
                    snapshot = ?opp.snapshot(),
                    "OPP updated"
                );
                self.dispatch(&table, event, &opp);
                opp.release();
                Ok(ChangeOutcome::Changed)
            }
        };

        self.registry.release(table);
        outcome
    }

    fn dispatch(&self, table: &OppTable, event: OppEvent, opp: &OppRef) {
        let started = Instant::now();
        let receivers = table.notify(event, opp);
        let elapsed = started.elapsed();

        let slow = elapsed > self.config.slow_dispatch_threshold();
        if slow {
            warn!(
                device = %table.device(),
                event = %event,
                receivers,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow OPP notification dispatch"
            );
        }
        self.metrics.record_dispatch(receivers, slow);
    }
}

impl OppVoltageApi for VoltageAdjuster {
    fn adjust_voltage(
        &self,
        device: &DeviceId,
        frequency: Hertz,
        target: MicroVolt,
        min: MicroVolt,
        max: MicroVolt,
    ) -> Result<ChangeOutcome, AdjustError> {
        let voltages = Voltages { target, min, max };
        self.update_entry(device, frequency, OppEvent::AdjustVoltage, |guard, opp| {
            guard.set_voltages(opp, voltages)
        })
    }

    fn enable_opp(
        &self,
        device: &DeviceId,
        frequency: Hertz,
    ) -> Result<ChangeOutcome, AdjustError> {
        self.update_entry(device, frequency, OppEvent::Enable, |guard, opp| {
            guard.set_availability(opp, true)
        })
    }

    fn disable_opp(
        &self,
        device: &DeviceId,
        frequency: Hertz,
    ) -> Result<ChangeOutcome, AdjustError> {
        self.update_entry(device, frequency, OppEvent::Disable, |guard, opp| {
            guard.set_availability(opp, false)
        })
    }

    fn subscribe_shared(
        &self,
        device: &DeviceId,
        filter: EventFilter,
        observer: SharedOppObserver,
    ) -> Result<Subscription, AdjustError> {
        let table = self.acquire(device)?;
        Ok(table.subscribe_shared(filter, observer))
    }
}
