//! # Notifier Chain
//!
//! Defines the publishing side of the bus.

use crate::events::{EventFilter, OppEvent};
use crate::subscriber::{Observer, Subscription, Unsubscribe};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// One registered observer.
struct Slot<P> {
    id: u64,
    filter: EventFilter,
    /// Cleared on unsubscribe; rounds already in flight check it per call.
    active: Arc<AtomicBool>,
    observer: Arc<dyn Observer<P>>,
}

/// Observer list shared between the chain and its subscriptions.
struct ObserverSlots<P> {
    /// Next slot identifier.
    next_id: AtomicU64,

    /// Registered observers, in registration order.
    entries: RwLock<Vec<Slot<P>>>,
}

impl<P: 'static> Unsubscribe for ObserverSlots<P> {
    fn unsubscribe(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let Some(index) = entries.iter().position(|slot| slot.id == id) else {
            return false;
        };
        let slot = entries.remove(index);
        slot.active.store(false, Ordering::Release);
        true
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.read().iter().any(|slot| slot.id == id)
    }
}

/// Ordered, synchronous notifier chain.
///
/// `notify()` snapshots the matching observers under a read lock, releases
/// the lock, then calls each observer in turn on the current thread.
pub struct NotifierChain<P: 'static> {
    /// Registered observers.
    slots: Arc<ObserverSlots<P>>,

    /// Total events published.
    events_published: AtomicU64,
}

impl<P: 'static> NotifierChain<P> {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new(ObserverSlots {
                next_id: AtomicU64::new(1),
                entries: RwLock::new(Vec::new()),
            }),
            events_published: AtomicU64::new(0),
        }
    }

    /// Register an observer for every event kind.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<P> + 'static,
    {
        self.subscribe_shared(EventFilter::all(), Arc::new(observer))
    }

    /// Register an observer for the event kinds accepted by `filter`.
    pub fn subscribe_filtered<O>(&self, filter: EventFilter, observer: O) -> Subscription
    where
        O: Observer<P> + 'static,
    {
        self.subscribe_shared(filter, Arc::new(observer))
    }

    /// Register an already shared observer.
    pub fn subscribe_shared(
        &self,
        filter: EventFilter,
        observer: Arc<dyn Observer<P>>,
    ) -> Subscription {
        let id = self.slots.next_id.fetch_add(1, Ordering::Relaxed);

        self.slots.entries.write().push(Slot {
            id,
            filter: filter.clone(),
            active: Arc::new(AtomicBool::new(true)),
            observer,
        });

        debug!(subscription = id, events = ?filter.events, "New subscription created");

        let slots: Arc<dyn Unsubscribe> = self.slots.clone();
        Subscription::new(id, Arc::downgrade(&slots))
    }

    /// Deliver `event` to every matching observer, in registration order.
    ///
    /// An observer unsubscribed while the round is running is skipped if
    /// its turn has not come yet. Returns the number of observers invoked.
    pub fn notify(&self, event: OppEvent, payload: &P) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let targets: Vec<(Arc<AtomicBool>, Arc<dyn Observer<P>>)> = self
            .slots
            .entries
            .read()
            .iter()
            .filter(|slot| slot.filter.matches(event))
            .map(|slot| (slot.active.clone(), slot.observer.clone()))
            .collect();

        let mut receivers = 0;
        for (active, observer) in &targets {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            observer.on_event(event, payload);
            receivers += 1;
        }

        trace!(event = %event, receivers, "Event published");
        receivers
    }

    /// Number of registered observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.slots.entries.read().len()
    }

    /// Total number of `notify()` calls.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl<P: 'static> Default for NotifierChain<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> std::fmt::Debug for NotifierChain<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierChain")
            .field("subscribers", &self.subscriber_count())
            .field("events_published", &self.events_published())
            .finish()
    }
}
