// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device diagnostic records.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::event::DeviceAddress;
use crate::gatt::GattStatus;

/// What the dispatcher observed for one device but did not turn into events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceDiagnostics {
    /// Services reported with no characteristics by the last successful discovery.
    pub integrity_warnings: Vec<Uuid>,
    /// Status of the last failed discovery, if any.
    pub last_discovery_failure: Option<GattStatus>,
    /// Number of characteristic reads that completed with a failure status.
    pub read_failures: u64,
    /// Status of the last characteristic write acknowledgment.
    pub last_write_status: Option<GattStatus>,
    /// Status of the last descriptor read or write.
    pub last_descriptor_status: Option<GattStatus>,
    /// Number of notifications dispatched.
    pub notifications: u64,
}

/// Diagnostic records for every device seen by the dispatcher.
#[derive(Debug, Default)]
pub struct Diagnostics {
    devices: RwLock<HashMap<DeviceAddress, DeviceDiagnostics>>,
}

impl Diagnostics {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, address: &DeviceAddress, f: impl FnOnce(&mut DeviceDiagnostics)) {
        let mut devices = self.devices.write();
        f(devices.entry(address.clone()).or_default());
    }

    /// Replaces the integrity warnings with those of a new discovery.
    pub fn record_integrity_warnings(&self, address: &DeviceAddress, services: Vec<Uuid>) {
        self.update(address, |d| d.integrity_warnings = services);
    }

    /// Records a failed discovery.
    pub fn record_discovery_failure(&self, address: &DeviceAddress, status: GattStatus) {
        self.update(address, |d| d.last_discovery_failure = Some(status));
    }

    /// Counts a failed characteristic read.
    pub fn record_read_failure(&self, address: &DeviceAddress) {
        self.update(address, |d| d.read_failures += 1);
    }

    /// Records the status of a write acknowledgment.
    pub fn record_write_status(&self, address: &DeviceAddress, status: GattStatus) {
        self.update(address, |d| d.last_write_status = Some(status));
    }

    /// Records the status of a descriptor operation.
    pub fn record_descriptor_status(&self, address: &DeviceAddress, status: GattStatus) {
        self.update(address, |d| d.last_descriptor_status = Some(status));
    }

    /// Counts a dispatched notification.
    pub fn record_notification(&self, address: &DeviceAddress) {
        self.update(address, |d| d.notifications += 1);
    }

    /// Returns the record of one device.
    #[must_use]
    pub fn get(&self, address: &DeviceAddress) -> Option<DeviceDiagnostics> {
        self.devices.read().get(address).cloned()
    }

    /// Returns a copy of every record.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<DeviceAddress, DeviceDiagnostics> {
        self.devices.read().clone()
    }

    /// Forgets one device.
    pub fn remove(&self, address: &DeviceAddress) {
        self.devices.write().remove(address);
    }

    /// Forgets every device.
    pub fn clear(&self) {
        self.devices.write().clear();
    }
}
