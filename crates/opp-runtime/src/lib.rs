//! # OPP Runtime
//!
//! Simulation harness for the OPP core. It plays the part of an adaptive
//! voltage scaling controller: one agent per device keeps nudging voltages
//! while observers log every change and an async consumer counts them.
//!
//! ## Modular Structure
//!
//! - `config` - environment and tables file loading
//! - `agent` - the per-device adjustment loop
//! - `runtime` - wiring, task lifecycle and shutdown
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (from env, tables from file or demo set)
//! 2. Register tables and subscribe observers
//! 3. Spawn agents and the event consumer
//! 4. Stop after the configured rounds or on Ctrl+C
//! 5. Log the metrics snapshot

pub mod agent;
pub mod config;
pub mod runtime;

pub use agent::{AgentReport, AvsAgent};
pub use config::{AvsConfig, RuntimeConfig, TablesFile};
pub use runtime::{OppRuntime, RunReport};
