//! # Shared Types Crate
//!
//! Units and identifiers used across the OPP workspace.
//!
//! ## Design Principles
//!
//! - **Typed units**: frequencies are `Hertz`, voltages are `MicroVolt`. Raw
//!   integers never cross a crate boundary.
//! - **Whole triplets**: a voltage update is always a `Voltages` value, so the
//!   target, minimum and maximum travel together.

pub mod entities;

pub use entities::*;
