//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API used by the voltage monitoring agent
//! - Driven Ports (outbound) - observers the core calls back into

pub mod inbound;
pub mod outbound;

pub use inbound::{ChangeOutcome, OppVoltageApi};
pub use outbound::{OppObserver, SharedOppObserver};
