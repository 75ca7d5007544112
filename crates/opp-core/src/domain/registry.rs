//! Device to OPP table registry
//!
//! The registry is an explicit value, owned by whoever wires the system
//! together, not process-wide state. Its lock guards only the mapping; it is
//! never held while a table is locked or its observers run.

use parking_lot::RwLock;
use shared_bus::OppEvent;
use shared_types::{DeviceId, Hertz, Voltages};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

use super::table::OppTable;
use crate::error::RegistryError;

/// A held reference to a registered table.
///
/// The table stays alive while any handle exists, even after its device has
/// been unregistered. Dropping the handle releases it.
#[derive(Debug, Clone)]
pub struct TableHandle {
    table: Arc<OppTable>,
}

impl TableHandle {
    /// Number of references to the table, the registry's own included while
    /// the device is registered.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.table)
    }

    /// Whether both handles refer to the same table.
    pub fn same_table(&self, other: &TableHandle) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }
}

impl Deref for TableHandle {
    type Target = OppTable;

    fn deref(&self) -> &OppTable {
        &self.table
    }
}

/// Maps devices to their OPP tables.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<DeviceId, Arc<OppTable>>>,
}

impl TableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a table for `device` with the given entries, in order.
    pub fn register_table(
        &self,
        device: DeviceId,
        entries: impl IntoIterator<Item = (Hertz, Voltages)>,
    ) -> Result<TableHandle, RegistryError> {
        let mut tables = self.tables.write();
        if tables.contains_key(&device) {
            return Err(RegistryError::AlreadyRegistered(device));
        }

        let table = Arc::new(OppTable::with_entries(device.clone(), entries));
        debug!(device = %device, opps = table.opp_count(), "OPP table registered");
        tables.insert(device, table.clone());

        Ok(TableHandle { table })
    }

    /// Remove the table for `device`.
    ///
    /// Every entry is unlisted and announced with [`OppEvent::Remove`] after
    /// all locks are released. Handles and entry references held elsewhere
    /// stay valid; the table is dropped with the last of them.
    pub fn unregister_table(&self, device: &DeviceId) -> Result<(), RegistryError> {
        let table = self
            .tables
            .write()
            .remove(device)
            .ok_or_else(|| RegistryError::DeviceNotFound(device.clone()))?;

        let removed = table.detach();
        debug!(device = %device, opps = removed.len(), "OPP table unregistered");

        for opp in &removed {
            table.notify(OppEvent::Remove, opp);
        }
        Ok(())
    }

    /// Look up and hold the table for `device`.
    pub fn acquire(&self, device: &DeviceId) -> Result<TableHandle, RegistryError> {
        self.tables
            .read()
            .get(device)
            .map(|table| TableHandle {
                table: table.clone(),
            })
            .ok_or_else(|| RegistryError::DeviceNotFound(device.clone()))
    }

    /// Give a handle back.
    pub fn release(&self, handle: TableHandle) {
        drop(handle);
    }

    /// Whether `device` has a table.
    pub fn contains(&self, device: &DeviceId) -> bool {
        self.tables.read().contains_key(device)
    }

    /// Registered devices, sorted.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.tables.read().keys().cloned().collect();
        devices.sort();
        devices
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}
