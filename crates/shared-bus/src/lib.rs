//! # Shared Bus - Notifier Chain for OPP Table Events
//!
//! An in-process publish mechanism: every table owns one chain and every
//! interested party registers an observer on it.
//!
//! ## Dispatch Rules
//!
//! - Observers run **synchronously** on the publishing thread.
//! - Observers run **in registration order**, each exactly once per event.
//! - The chain never holds its own lock while an observer runs, so an
//!   observer may subscribe, unsubscribe or publish again.
//!
//! ```text
//! ┌──────────────┐   notify(event, &payload)   ┌──────────────┐
//! │  OPP table   │ ──────────────────────────→ │  observer 1  │
//! │              │                             ├──────────────┤
//! │              │                             │  observer 2  │
//! └──────────────┘                             ├──────────────┤
//!                                              │     ...      │
//!                                              └──────────────┘
//! ```
//!
//! ## Lifetime
//!
//! `subscribe()` returns a `Subscription`. Dropping it removes the observer;
//! `Subscription::detach()` keeps the observer for as long as the chain lives.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, OppEvent};
pub use publisher::NotifierChain;
pub use subscriber::{Observer, Subscription};
