//! OPP entries and reference-counted handles
//!
//! An entry's frequency never changes. Its voltage triplet and availability
//! are written only through an [`OppTableGuard`](super::OppTableGuard), i.e.
//! while the owning table's mutex is held. Readers holding an [`OppRef`]
//! outside that mutex take a snapshot, which may be stale but is never torn:
//! the per-entry lock makes every write of the triplet a single step.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{Hertz, Voltages};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mutable part of an entry.
#[derive(Debug, Clone, Copy)]
struct OppState {
    voltages: Voltages,
    available: bool,
}

/// One Operating Performance Point.
#[derive(Debug)]
pub struct OppEntry {
    frequency: Hertz,
    state: RwLock<OppState>,
    /// Cleared once the entry leaves its table.
    listed: AtomicBool,
}

impl OppEntry {
    fn new(frequency: Hertz, voltages: Voltages) -> Self {
        Self {
            frequency,
            state: RwLock::new(OppState {
                voltages,
                available: true,
            }),
            listed: AtomicBool::new(true),
        }
    }

    /// The frequency this entry describes.
    pub fn frequency(&self) -> Hertz {
        self.frequency
    }

    /// Current voltage triplet, read as one value.
    pub fn snapshot_voltages(&self) -> Voltages {
        self.state.read().voltages
    }

    /// Whether the entry may be selected by frequency scaling.
    pub fn is_available(&self) -> bool {
        self.state.read().available
    }

    /// Whether the entry is still part of its table.
    pub fn is_listed(&self) -> bool {
        self.listed.load(Ordering::Acquire)
    }

    /// Frequency, voltages and availability as of now.
    pub fn snapshot(&self) -> OppSnapshot {
        let state = *self.state.read();
        OppSnapshot {
            frequency: self.frequency,
            voltages: state.voltages,
            available: state.available,
        }
    }

    /// Replace the triplet unless the target is already `voltages.target`.
    pub(crate) fn store_voltages(&self, voltages: Voltages) -> bool {
        let mut state = self.state.write();
        if state.voltages.target == voltages.target {
            return false;
        }
        state.voltages = voltages;
        true
    }

    pub(crate) fn store_availability(&self, available: bool) -> bool {
        let mut state = self.state.write();
        if state.available == available {
            return false;
        }
        state.available = available;
        true
    }

    pub(crate) fn mark_unlisted(&self) {
        self.listed.store(false, Ordering::Release);
    }
}

/// Owned copy of an entry's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OppSnapshot {
    pub frequency: Hertz,
    pub voltages: Voltages,
    pub available: bool,
}

/// Counted reference to an [`OppEntry`].
///
/// `retain()` takes another reference and `release()` (or drop) gives one
/// back. The owning table keeps one reference for as long as the entry is
/// listed; the entry is freed once it is unlisted and the last reference is
/// released.
#[derive(Debug)]
pub struct OppRef(Arc<OppEntry>);

impl OppRef {
    pub(crate) fn new(frequency: Hertz, voltages: Voltages) -> Self {
        Self(Arc::new(OppEntry::new(frequency, voltages)))
    }

    /// Take an additional reference.
    #[must_use]
    pub fn retain(&self) -> Self {
        Self(Arc::clone(&self.0))
    }

    /// Give this reference back.
    pub fn release(self) {
        drop(self);
    }

    /// Number of live references, including the table's own while listed.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether both references point at the same entry.
    pub fn ptr_eq(&self, other: &OppRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Clone for OppRef {
    fn clone(&self) -> Self {
        self.retain()
    }
}

impl Deref for OppRef {
    type Target = OppEntry;

    fn deref(&self) -> &OppEntry {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> OppRef {
        OppRef::new(Hertz(1_000_000), Voltages::new(900_000, 850_000, 950_000))
    }

    #[test]
    fn test_retain_and_release_adjust_count() {
        let opp = entry();
        assert_eq!(opp.ref_count(), 1);

        let extra = opp.retain();
        assert_eq!(opp.ref_count(), 2);
        assert!(extra.ptr_eq(&opp));

        extra.release();
        assert_eq!(opp.ref_count(), 1);
    }

    #[test]
    fn test_same_target_is_noop() {
        let opp = entry();

        // Only the target decides; min/max alone do not count as a change.
        assert!(!opp.store_voltages(Voltages::new(900_000, 800_000, 990_000)));
        assert_eq!(
            opp.snapshot_voltages(),
            Voltages::new(900_000, 850_000, 950_000)
        );

        assert!(opp.store_voltages(Voltages::new(920_000, 870_000, 960_000)));
        assert_eq!(
            opp.snapshot_voltages(),
            Voltages::new(920_000, 870_000, 960_000)
        );
    }

    #[test]
    fn test_availability_toggle() {
        let opp = entry();
        assert!(opp.is_available());
        assert!(!opp.store_availability(true));
        assert!(opp.store_availability(false));
        assert!(!opp.snapshot().available);
    }

    #[test]
    fn test_unlisted_entry_stays_readable() {
        let opp = entry();
        let held = opp.retain();
        opp.mark_unlisted();
        drop(opp);

        assert!(!held.is_listed());
        assert_eq!(held.frequency(), Hertz(1_000_000));
        assert_eq!(held.ref_count(), 1);
    }
}
