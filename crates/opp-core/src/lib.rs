//! # OPP Core
//!
//! Operating Performance Point tables with runtime voltage adjustment.
//!
//! An adaptive voltage scaling agent calls `adjust_voltage` to move the
//! (target, min, max) triplet of an existing OPP while frequency scaling
//! drivers keep reading the same table. Observers hear about every real
//! change exactly once.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): tables and their entries, no async code
//!   - `OppEntry` / `OppRef`: one operating point and a counted reference
//!   - `OppTable` / `OppTableGuard`: per-device table and its critical section
//!   - `TableRegistry` / `TableHandle`: device lookup
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `OppVoltageApi`: Driving port (inbound API)
//!   - `OppObserver`: Driven port (change observers)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `VoltageAdjuster`: Implements `OppVoltageApi`
//!
//! - **Adapters Layer** (`adapters/`): Observer implementations
//!   - `EventBridge`: async broadcast of notifications
//!   - `TracingObserver`: structured logging of events
//!
//! ## Invariants
//!
//! - **Two phases**: table state changes under the table mutex; observers
//!   run after it is released, never inside it.
//! - **No spurious notifications**: an unchanged target never reaches an
//!   observer.
//! - **Reference safety**: the entry passed to observers is retained before
//!   the mutex is released, so it stays readable even if removed meanwhile.
//! - **Whole triplets**: readers never see a partially written triplet.
//!
//! ## Usage Example
//!
//! ```ignore
//! use opp_core::{OppVoltageApi, TableRegistry, VoltageAdjuster};
//! use shared_types::{DeviceId, Hertz, MicroVolt, Voltages};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TableRegistry::new());
//! let cpu0 = DeviceId::from("cpu0");
//! registry.register_table(
//!     cpu0.clone(),
//!     [(Hertz(1_000_000), Voltages::new(900_000, 850_000, 950_000))],
//! )?;
//!
//! let adjuster = VoltageAdjuster::new(registry);
//! let _sub = adjuster.subscribe(&cpu0, |event, opp: &opp_core::OppRef| {
//!     println!("{event}: {:?}", opp.snapshot());
//! })?;
//!
//! adjuster.adjust_voltage(
//!     &cpu0,
//!     Hertz(1_000_000),
//!     MicroVolt(920_000),
//!     MicroVolt(870_000),
//!     MicroVolt(960_000),
//! )?;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{EventBridge, OppEventStream, OppNotification, TracingObserver};
pub use config::OppConfig;
pub use domain::{
    OppEntry, OppRef, OppSnapshot, OppTable, OppTableGuard, TableHandle, TableRegistry,
};
pub use error::{AdjustError, ConfigError, RegistryError, StreamError, TableError};
pub use metrics::{AdjustMetrics, MetricsSnapshot};
pub use ports::{ChangeOutcome, OppObserver, OppVoltageApi, SharedOppObserver};
pub use service::VoltageAdjuster;

pub use shared_bus::{EventFilter, OppEvent, Subscription};
