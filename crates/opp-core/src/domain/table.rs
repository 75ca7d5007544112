//! Per-device OPP table
//!
//! ## Locking protocol
//!
//! Every change goes through two phases:
//!
//! 1. **Locked**: `lock()` returns an [`OppTableGuard`]; lookup, compare and
//!    store happen on the guard. The critical section does not allocate.
//! 2. **Unlocked**: the guard is dropped, then `notify()` runs the observers
//!    with a retained [`OppRef`]. Observers may lock the table again.
//!
//! Distinct tables never share a lock.

use parking_lot::{Mutex, MutexGuard};
use shared_bus::{EventFilter, NotifierChain, Observer, OppEvent, Subscription};
use shared_types::{DeviceId, Hertz, Voltages};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::entry::{OppRef, OppSnapshot};
use crate::error::TableError;

/// The OPP table of one device.
pub struct OppTable {
    device: DeviceId,
    /// Entries in insertion order.
    entries: Mutex<Vec<OppRef>>,
    notifier: NotifierChain<OppRef>,
    /// Set once the device has been unregistered.
    detached: AtomicBool,
}

impl OppTable {
    /// Create an empty table.
    pub fn new(device: DeviceId) -> Self {
        Self::with_entries(device, std::iter::empty())
    }

    /// Create a table holding `entries` in the given order.
    ///
    /// Entries are taken verbatim. If a frequency appears twice, lookups
    /// return the first one.
    pub fn with_entries(
        device: DeviceId,
        entries: impl IntoIterator<Item = (Hertz, Voltages)>,
    ) -> Self {
        let entries: Vec<OppRef> = entries
            .into_iter()
            .map(|(frequency, voltages)| OppRef::new(frequency, voltages))
            .collect();

        Self {
            device,
            entries: Mutex::new(entries),
            notifier: NotifierChain::new(),
            detached: AtomicBool::new(false),
        }
    }

    /// Device owning this table.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Enter the critical section.
    pub fn lock(&self) -> OppTableGuard<'_> {
        OppTableGuard {
            entries: self.entries.lock(),
        }
    }

    /// First entry at `frequency`, retained for the caller.
    pub fn find_by_frequency(&self, frequency: Hertz) -> Option<OppRef> {
        let guard = self.lock();
        let found = guard.find_by_frequency(frequency).map(OppRef::retain);
        if found.is_none() {
            trace!(device = %self.device, frequency = %frequency, "OPP lookup missed");
        }
        found
    }

    /// Number of listed entries.
    pub fn opp_count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot of every listed entry, in table order.
    pub fn snapshots(&self) -> Vec<OppSnapshot> {
        self.lock().snapshots()
    }

    /// Append an entry and announce it with [`OppEvent::Add`].
    ///
    /// Fails once the table has been unregistered.
    pub fn add_opp(&self, frequency: Hertz, voltages: Voltages) -> Result<OppRef, TableError> {
        let opp = {
            let mut guard = self.lock();
            // `detach` sets the flag before taking the lock.
            if self.is_detached() {
                return Err(TableError::Detached {
                    device: self.device.clone(),
                });
            }
            if guard.find_by_frequency(frequency).is_some() {
                return Err(TableError::DuplicateFrequency {
                    device: self.device.clone(),
                    frequency,
                });
            }
            let opp = OppRef::new(frequency, voltages);
            guard.entries.push(opp.retain());
            opp
        };

        debug!(device = %self.device, frequency = %frequency, voltages = %voltages, "OPP added");
        self.notify(OppEvent::Add, &opp);
        Ok(opp)
    }

    /// Unlist the first entry at `frequency` and announce it with
    /// [`OppEvent::Remove`].
    ///
    /// The returned reference keeps the entry readable.
    pub fn remove_opp(&self, frequency: Hertz) -> Option<OppRef> {
        let opp = {
            let mut guard = self.lock();
            let index = guard
                .entries
                .iter()
                .position(|opp| opp.frequency() == frequency)?;
            let opp = guard.entries.remove(index);
            opp.mark_unlisted();
            opp
        };

        debug!(device = %self.device, frequency = %frequency, "OPP removed");
        self.notify(OppEvent::Remove, &opp);
        Some(opp)
    }

    /// Unlist everything and mark the table detached.
    ///
    /// Returns the unlisted entries so the caller can announce them once no
    /// lock is held.
    pub(crate) fn detach(&self) -> Vec<OppRef> {
        self.detached.store(true, Ordering::Release);
        let removed = std::mem::take(&mut *self.entries.lock());
        for opp in &removed {
            opp.mark_unlisted();
        }
        removed
    }

    /// Whether the device has been unregistered.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Register an observer for every event on this table.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<OppRef> + 'static,
    {
        self.notifier.subscribe(observer)
    }

    /// Register an observer for the events accepted by `filter`.
    pub fn subscribe_filtered<O>(&self, filter: EventFilter, observer: O) -> Subscription
    where
        O: Observer<OppRef> + 'static,
    {
        self.notifier.subscribe_filtered(filter, observer)
    }

    /// Register an already shared observer.
    pub fn subscribe_shared(
        &self,
        filter: EventFilter,
        observer: Arc<dyn Observer<OppRef>>,
    ) -> Subscription {
        self.notifier.subscribe_shared(filter, observer)
    }

    /// Run every matching observer, in registration order, with `opp`.
    ///
    /// Must not be called while holding this table's guard.
    pub fn notify(&self, event: OppEvent, opp: &OppRef) -> usize {
        self.notifier.notify(event, opp)
    }

    /// Number of registered observers.
    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }
}

impl Drop for OppTable {
    fn drop(&mut self) {
        debug!(device = %self.device, "OPP table torn down");
    }
}

impl std::fmt::Debug for OppTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OppTable")
            .field("device", &self.device)
            .field("detached", &self.is_detached())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a table's entries.
///
/// Holding a guard is the only way to change an entry.
pub struct OppTableGuard<'a> {
    entries: MutexGuard<'a, Vec<OppRef>>,
}

impl OppTableGuard<'_> {
    /// First entry at `frequency`, by linear scan.
    pub fn find_by_frequency(&self, frequency: Hertz) -> Option<&OppRef> {
        self.entries.iter().find(|opp| opp.frequency() == frequency)
    }

    /// Store a new voltage triplet on `opp`.
    ///
    /// Returns `false` without touching anything when the target voltage is
    /// already `voltages.target`; otherwise writes all three values at once
    /// and returns `true`.
    pub fn set_voltages(&self, opp: &OppRef, voltages: Voltages) -> bool {
        debug_assert!(self.contains(opp), "entry does not belong to this table");
        opp.store_voltages(voltages)
    }

    /// Set whether `opp` is available. Returns `false` if nothing changed.
    pub fn set_availability(&self, opp: &OppRef, available: bool) -> bool {
        debug_assert!(self.contains(opp), "entry does not belong to this table");
        opp.store_availability(available)
    }

    /// Listed entries, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &OppRef> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every listed entry, in table order.
    pub fn snapshots(&self) -> Vec<OppSnapshot> {
        self.entries.iter().map(|opp| opp.snapshot()).collect()
    }

    fn contains(&self, opp: &OppRef) -> bool {
        self.entries.iter().any(|listed| listed.ptr_eq(opp))
    }
}
