// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `gattmux` library.
//!
//! Every failure in this crate degrades to "the operation did not happen,
//! state is unchanged". Nothing here is meant to terminate the process:
//! the caller decides whether a failure is worth showing to the user.

use thiserror::Error;
use uuid::Uuid;

use crate::event::DeviceAddress;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying transport stack is not available.
    #[error("transport stack is not initialized")]
    NotInitialized,

    /// No session is registered for the device.
    #[error("device {0} is not connected")]
    NotConnected(DeviceAddress),

    /// The device address cannot be used as a session key.
    #[error("invalid device address: {0:?}")]
    InvalidAddress(String),

    /// The transport refused or could not start an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A GATT attribute required by the operation is missing or in the wrong state.
    #[error("gatt error: {0}")]
    Gatt(#[from] GattError),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors reported while talking to the transport stack.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The stack could not create a session for the device.
    #[error("could not open a session: {0}")]
    SessionUnavailable(String),

    /// The stack declined to initiate the operation.
    #[error("transport rejected {operation}")]
    Rejected {
        /// The operation that was rejected.
        operation: &'static str,
    },

    /// The callback channel to the dispatcher is closed.
    #[error("callback channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to the GATT attribute table of a device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GattError {
    /// Service discovery has not completed for the device.
    #[error("services have not been discovered yet")]
    ServicesNotDiscovered,

    /// The requested service is not exposed by the device.
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    /// The requested characteristic is not exposed by the device.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// The characteristic does not carry the requested descriptor.
    #[error("descriptor {descriptor} not found on characteristic {characteristic}")]
    DescriptorNotFound {
        /// The characteristic that was searched.
        characteristic: Uuid,
        /// The descriptor that was expected.
        descriptor: Uuid,
    },

    /// Notifications were not enabled locally before writing the descriptor.
    #[error("notifications are not enabled locally for characteristic {0}")]
    NotificationsDisabled(Uuid),

    /// None of the discovered services matches a known sensor.
    #[error("no known sensor among the discovered services")]
    NoKnownSensor,
}

/// Errors related to loading a [`HubConfig`](crate::manager::HubConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors reported by sensor decoders.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is shorter than the sensor's frame.
    #[error("payload too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum payload length.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
