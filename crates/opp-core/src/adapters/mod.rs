//! Adapters Layer
//!
//! Observer implementations connecting the core to the outside:
//!
//! - `EventBridge` / `BroadcastObserver`: fan notifications out to async
//!   consumers over a broadcast channel
//! - `TracingObserver`: log every event

pub mod event_stream;
pub mod log_observer;

pub use event_stream::{BroadcastObserver, EventBridge, OppEventStream, OppNotification};
pub use log_observer::TracingObserver;
