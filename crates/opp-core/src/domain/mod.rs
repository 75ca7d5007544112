//! Domain Layer - OPP entries, tables and the registry
//!
//! This layer contains:
//! - `OppEntry` / `OppRef`: one operating point and its counted reference
//! - `OppTable` / `OppTableGuard`: per-device table and its critical section
//! - `TableRegistry` / `TableHandle`: device lookup with held references
//!
//! RULES:
//! - No async code
//! - Observers are never called while a table or registry lock is held

pub mod entry;
pub mod registry;
pub mod table;

pub use entry::{OppEntry, OppRef, OppSnapshot};
pub use registry::{TableHandle, TableRegistry};
pub use table::{OppTable, OppTableGuard};
