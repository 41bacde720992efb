// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized device event types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gatt::GattStatus;

use super::DeviceAddress;

/// Events emitted by the event dispatcher.
///
/// Every transport callback, whatever session raised it, is turned into
/// one of these variants tagged with the originating device address.
/// Events are immutable once published.
///
/// Payloads are attached only when the transport reported a non-empty
/// value. Consumers must treat `value: None` as "the event occurred, no
/// data came with it".
///
/// # Examples
///
/// ```
/// use gattmux::event::{DeviceAddress, DeviceEvent, EventKind};
/// use uuid::Uuid;
///
/// let address = DeviceAddress::new("AA:BB");
/// let event = DeviceEvent::data_notify(address.clone(), Uuid::nil(), vec![0x10, 0x20]);
///
/// assert_eq!(event.address(), &address);
/// assert_eq!(event.kind(), EventKind::DataNotify);
/// assert_eq!(event.payload(), Some(&[0x10, 0x20][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// The link to the device is up.
    Connected {
        /// The device address.
        address: DeviceAddress,
    },

    /// The link to the device is down.
    Disconnected {
        /// The device address.
        address: DeviceAddress,
    },

    /// Service discovery completed successfully.
    ServicesReady {
        /// The device address.
        address: DeviceAddress,
    },

    /// A characteristic read completed successfully.
    DataRead {
        /// The device address.
        address: DeviceAddress,
        /// The characteristic that was read.
        characteristic: Uuid,
        /// The value read, if non-empty.
        value: Option<Vec<u8>>,
    },

    /// The device pushed a characteristic value.
    DataNotify {
        /// The device address.
        address: DeviceAddress,
        /// The characteristic that changed.
        characteristic: Uuid,
        /// The pushed value, if non-empty.
        value: Option<Vec<u8>>,
    },

    /// A characteristic write was acknowledged.
    ///
    /// Emitted whatever the status; the status is attached for diagnostics.
    DataWritten {
        /// The device address.
        address: DeviceAddress,
        /// The characteristic that was written.
        characteristic: Uuid,
        /// The characteristic value after the write, if non-empty.
        value: Option<Vec<u8>>,
        /// Status reported by the transport.
        status: GattStatus,
    },
}

/// Discriminant of a [`DeviceEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// See [`DeviceEvent::Connected`].
    Connected,
    /// See [`DeviceEvent::Disconnected`].
    Disconnected,
    /// See [`DeviceEvent::ServicesReady`].
    ServicesReady,
    /// See [`DeviceEvent::DataRead`].
    DataRead,
    /// See [`DeviceEvent::DataNotify`].
    DataNotify,
    /// See [`DeviceEvent::DataWritten`].
    DataWritten,
}

/// Keeps a payload only when it carries data.
fn non_empty(value: Vec<u8>) -> Option<Vec<u8>> {
    if value.is_empty() { None } else { Some(value) }
}

impl DeviceEvent {
    /// Returns the address of the device that raised this event.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        match self {
            Self::Connected { address }
            | Self::Disconnected { address }
            | Self::ServicesReady { address }
            | Self::DataRead { address, .. }
            | Self::DataNotify { address, .. }
            | Self::DataWritten { address, .. } => address,
        }
    }

    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::ServicesReady { .. } => EventKind::ServicesReady,
            Self::DataRead { .. } => EventKind::DataRead,
            Self::DataNotify { .. } => EventKind::DataNotify,
            Self::DataWritten { .. } => EventKind::DataWritten,
        }
    }

    /// Returns the characteristic this event refers to, if any.
    #[must_use]
    pub fn characteristic(&self) -> Option<Uuid> {
        match self {
            Self::DataRead { characteristic, .. }
            | Self::DataNotify { characteristic, .. }
            | Self::DataWritten { characteristic, .. } => Some(*characteristic),
            _ => None,
        }
    }

    /// Returns the raw payload carried by this event, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::DataRead { value, .. }
            | Self::DataNotify { value, .. }
            | Self::DataWritten { value, .. } => value.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connected { .. } | Self::Disconnected { .. })
    }

    /// Creates a connected event.
    #[must_use]
    pub fn connected(address: DeviceAddress) -> Self {
        Self::Connected { address }
    }

    /// Creates a disconnected event.
    #[must_use]
    pub fn disconnected(address: DeviceAddress) -> Self {
        Self::Disconnected { address }
    }

    /// Creates a services-ready event.
    #[must_use]
    pub fn services_ready(address: DeviceAddress) -> Self {
        Self::ServicesReady { address }
    }

    /// Creates a data-read event. Empty values are dropped from the event.
    #[must_use]
    pub fn data_read(address: DeviceAddress, characteristic: Uuid, value: Vec<u8>) -> Self {
        Self::DataRead {
            address,
            characteristic,
            value: non_empty(value),
        }
    }

    /// Creates a data-notify event. Empty values are dropped from the event.
    #[must_use]
    pub fn data_notify(address: DeviceAddress, characteristic: Uuid, value: Vec<u8>) -> Self {
        Self::DataNotify {
            address,
            characteristic,
            value: non_empty(value),
        }
    }

    /// Creates a data-written event. Empty values are dropped from the event.
    #[must_use]
    pub fn data_written(
        address: DeviceAddress,
        characteristic: Uuid,
        value: Vec<u8>,
        status: GattStatus,
    ) -> Self {
        Self::DataWritten {
            address,
            characteristic,
            value: non_empty(value),
            status,
        }
    }
}
