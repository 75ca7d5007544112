//! Outbound Ports (Driven Ports)
//!
//! Observers are what the core calls back into after a real change. They run
//! synchronously on the adjusting thread, after the table lock is released,
//! and receive a reference that keeps the entry alive for the whole call.

use shared_bus::Observer;
use std::sync::Arc;

use crate::domain::OppRef;

/// An observer of OPP table events.
///
/// Any `Fn(OppEvent, &OppRef) + Send + Sync` closure qualifies.
pub trait OppObserver: Observer<OppRef> {}

impl<T> OppObserver for T where T: Observer<OppRef> + ?Sized {}

/// An observer shared between several registrations.
pub type SharedOppObserver = Arc<dyn Observer<OppRef>>;
