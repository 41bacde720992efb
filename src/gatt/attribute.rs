// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service, characteristic and descriptor types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CLIENT_CHARACTERISTIC_CONFIG;

/// A service discovered on a peripheral.
///
/// # Examples
///
/// ```
/// use gattmux::gatt::{Characteristic, Service};
/// use uuid::Uuid;
///
/// let service_uuid = Uuid::from_u128(0xf000aa70_0451_4000_b000_000000000000);
/// let data_uuid = Uuid::from_u128(0xf000aa71_0451_4000_b000_000000000000);
///
/// let service = Service::new(service_uuid)
///     .with_characteristic(Characteristic::new(service_uuid, data_uuid).with_notify_descriptor());
///
/// assert!(service.characteristic(data_uuid).is_some());
/// assert!(!service.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    uuid: Uuid,
    characteristics: Vec<Characteristic>,
}

impl Service {
    /// Creates a service with no characteristics.
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    /// Adds a characteristic to the service.
    #[must_use]
    pub fn with_characteristic(mut self, characteristic: Characteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    /// Returns the service UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the characteristics exposed by the service.
    #[must_use]
    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    /// Looks up a characteristic by UUID.
    #[must_use]
    pub fn characteristic(&self, uuid: Uuid) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }

    /// Returns `true` if discovery reported no characteristics for this service.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characteristics.is_empty()
    }
}

/// A characteristic, the typed data slot of a service.
///
/// The characteristic carries its current local value: writes send this
/// value, and reads/notifications report the value the device returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    uuid: Uuid,
    service: Uuid,
    value: Vec<u8>,
    descriptors: Vec<Descriptor>,
}

impl Characteristic {
    /// Creates a characteristic belonging to `service`.
    #[must_use]
    pub fn new(service: Uuid, uuid: Uuid) -> Self {
        Self {
            uuid,
            service,
            value: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Sets the local value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self
    }

    /// Adds a descriptor.
    #[must_use]
    pub fn with_descriptor(mut self, uuid: Uuid) -> Self {
        self.descriptors.push(Descriptor::new(self.uuid, uuid));
        self
    }

    /// Adds the client characteristic configuration descriptor, which
    /// makes the characteristic subscribable.
    #[must_use]
    pub fn with_notify_descriptor(self) -> Self {
        self.with_descriptor(CLIENT_CHARACTERISTIC_CONFIG)
    }

    /// Returns the characteristic UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the UUID of the owning service.
    #[must_use]
    pub fn service(&self) -> Uuid {
        self.service
    }

    /// Returns the local value.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Replaces the local value.
    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) {
        self.value = value.into();
    }

    /// Returns the descriptors.
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Looks up a descriptor by UUID.
    #[must_use]
    pub fn descriptor(&self, uuid: Uuid) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.uuid == uuid)
    }
}

/// A descriptor attached to a characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    uuid: Uuid,
    characteristic: Uuid,
    value: Vec<u8>,
}

impl Descriptor {
    /// Creates an empty descriptor on `characteristic`.
    #[must_use]
    pub fn new(characteristic: Uuid, uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristic,
            value: Vec::new(),
        }
    }

    /// Returns the descriptor UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the UUID of the owning characteristic.
    #[must_use]
    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }

    /// Returns the local value.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Replaces the local value.
    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) {
        self.value = value.into();
    }
}
