//! # Observers and Subscriptions
//!
//! Defines the receiving side of the notifier chain.

use crate::events::OppEvent;
use std::sync::Weak;
use tracing::debug;

/// Something that wants to hear about events carrying a `P` payload.
///
/// Implemented for any `Fn(OppEvent, &P) + Send + Sync` closure.
pub trait Observer<P>: Send + Sync {
    /// Called once per published event that passes the registration filter.
    ///
    /// The payload is only borrowed for the duration of the call; clone it
    /// (for reference-counted payloads, retain it) to keep it longer.
    fn on_event(&self, event: OppEvent, payload: &P);
}

impl<P, F> Observer<P> for F
where
    F: Fn(OppEvent, &P) + Send + Sync,
{
    fn on_event(&self, event: OppEvent, payload: &P) {
        self(event, payload)
    }
}

/// Removal side of a chain, erased over the payload type.
pub(crate) trait Unsubscribe: Send + Sync {
    /// Remove the observer with `id`. Returns whether it was present.
    fn unsubscribe(&self, id: u64) -> bool;

    /// Whether the observer with `id` is still registered.
    fn contains(&self, id: u64) -> bool;
}

/// A registration handle.
///
/// When dropped, the observer is removed from the chain and no later call
/// reaches it, including calls from a round already in progress. A call
/// that has already started runs to completion. A handle outliving its
/// chain is inert.
#[must_use = "dropping a Subscription unregisters the observer"]
pub struct Subscription {
    /// Identifier of the observer slot.
    id: u64,

    /// Back reference for cleanup. `None` once detached.
    slots: Option<Weak<dyn Unsubscribe>>,
}

impl Subscription {
    /// Create a new subscription handle.
    pub(crate) fn new(id: u64, slots: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            slots: Some(slots),
        }
    }

    /// Identifier of this registration.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the observer is still registered on a live chain.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slots
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|slots| slots.contains(self.id))
    }

    /// Remove the observer now.
    ///
    /// Returns `false` when the chain is already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.remove()
    }

    /// Keep the observer registered until the chain itself is dropped.
    pub fn detach(mut self) {
        self.slots = None;
    }

    fn remove(&mut self) -> bool {
        let Some(slots) = self.slots.take().and_then(|weak| weak.upgrade()) else {
            return false;
        };
        let removed = slots.unsubscribe(self.id);
        debug!(subscription = self.id, removed, "Subscription dropped");
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.slots.is_none())
            .finish()
    }
}
