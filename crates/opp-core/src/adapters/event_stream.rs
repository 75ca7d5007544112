//! Async event stream bridge
//!
//! Observers run synchronously on the adjusting thread. Consumers living on
//! an async runtime subscribe through this bridge instead: the observer side
//! copies each notification into an owned [`OppNotification`] and pushes it
//! into a `tokio::sync::broadcast` channel.
//!
//! ## Usage
//!
//! ```ignore
//! let bridge = EventBridge::new(config.event_stream_capacity);
//! adjuster.subscribe(&cpu0, bridge.observer_for(cpu0.clone()))?.detach();
//!
//! let mut stream = bridge.stream();
//! tokio::spawn(async move {
//!     while let Some(notification) = stream.recv().await {
//!         governor.reconsider(notification);
//!     }
//! });
//! ```

use serde::{Deserialize, Serialize};
use shared_bus::{Observer, OppEvent};
use shared_types::DeviceId;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::domain::{OppRef, OppSnapshot};
use crate::error::StreamError;

/// Owned copy of one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OppNotification {
    pub device: DeviceId,
    pub event: OppEvent,
    pub snapshot: OppSnapshot,
}

/// Owner of the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBridge {
    sender: broadcast::Sender<OppNotification>,
    capacity: usize,
}

impl EventBridge {
    /// Create a bridge buffering up to `capacity` notifications per stream.
    ///
    /// # Panics
    /// If `capacity` is zero. `OppConfig::validate` rejects that value.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Observer that forwards events of `device` into the channel.
    pub fn observer_for(&self, device: DeviceId) -> BroadcastObserver {
        BroadcastObserver {
            device,
            sender: self.sender.clone(),
        }
    }

    /// A new receiving end. Sees only notifications sent after this call.
    pub fn stream(&self) -> OppEventStream {
        OppEventStream {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live streams.
    pub fn stream_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Sync observer feeding an [`EventBridge`].
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    device: DeviceId,
    sender: broadcast::Sender<OppNotification>,
}

impl Observer<OppRef> for BroadcastObserver {
    fn on_event(&self, event: OppEvent, opp: &OppRef) {
        let notification = OppNotification {
            device: self.device.clone(),
            event,
            snapshot: opp.snapshot(),
        };

        if self.sender.send(notification).is_err() {
            // No streams open; nothing to do.
            trace!(device = %self.device, event = %event, "Notification dropped (no streams)");
        }
    }
}

/// Receiving end of an [`EventBridge`].
pub struct OppEventStream {
    receiver: broadcast::Receiver<OppNotification>,
}

impl OppEventStream {
    /// Wait for the next notification.
    ///
    /// Returns `None` once every sender is gone. Notifications lost to lag
    /// are skipped.
    pub async fn recv(&mut self) -> Option<OppNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Event stream lagged, some notifications dropped");
                }
            }
        }
    }

    /// Take the next notification without waiting.
    ///
    /// - `Ok(Some(_))` - a notification was ready
    /// - `Ok(None)` - nothing buffered
    /// - `Err(StreamError::Closed)` - every sender is gone
    pub fn try_recv(&mut self) -> Result<Option<OppNotification>, StreamError> {
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => return Ok(Some(notification)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(StreamError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    debug!(lagged = count, "Event stream lagged, some notifications dropped");
                }
            }
        }
    }
}
