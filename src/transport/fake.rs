// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport for tests and demos.
//!
//! [`FakeTransport`] simulates a stack with a table of peripherals. It
//! records every operation a session initiates and can either answer each
//! operation through the session callback ([`FakeTransport::with_auto_respond`])
//! or stay silent and let the caller raise callbacks by hand, which is how
//! out-of-order and cross-device interleavings are reproduced.
//!
//! # Examples
//!
//! ```
//! use gattmux::event::DeviceAddress;
//! use gattmux::gatt::Service;
//! use gattmux::transport::fake::FakeTransport;
//! use uuid::Uuid;
//!
//! let fake = FakeTransport::new().with_auto_respond();
//! fake.add_peripheral("AA:BB", vec![Service::new(Uuid::nil())]);
//!
//! assert_eq!(fake.sessions_opened(&DeviceAddress::new("AA:BB")), 0);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::TransportError;
use crate::event::DeviceAddress;
use crate::gatt::{Characteristic, Descriptor, GattStatus, LinkState, Service};

use super::{SessionCallback, Transport, TransportEvent, TransportSession};

/// An operation initiated on a fake session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOperation {
    /// A session was opened.
    Open,
    /// `reconnect` was called.
    Reconnect,
    /// `disconnect` was called.
    Disconnect,
    /// `close` was called.
    Close,
    /// `discover_services` was called.
    DiscoverServices,
    /// A characteristic read was started.
    Read(Uuid),
    /// A characteristic write was started with the given value.
    Write(Uuid, Vec<u8>),
    /// Local notification delivery was toggled.
    SetNotification(Uuid, bool),
    /// A descriptor write was started.
    WriteDescriptor {
        /// The owning characteristic.
        characteristic: Uuid,
        /// The descriptor.
        descriptor: Uuid,
        /// The value written.
        value: Vec<u8>,
    },
}

#[derive(Debug)]
struct SessionRecord {
    id: u64,
    address: DeviceAddress,
    callback: SessionCallback,
    discovered: bool,
    closed: bool,
}

#[derive(Debug)]
struct FakeState {
    initialized: bool,
    auto_respond: bool,
    resume_succeeds: bool,
    next_id: u64,
    peripherals: HashMap<DeviceAddress, Vec<Service>>,
    sessions: Vec<SessionRecord>,
    operations: Vec<(DeviceAddress, FakeOperation)>,
}

impl FakeState {
    fn record(&self, id: u64) -> Option<&SessionRecord> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn record_mut(&mut self, id: u64) -> Option<&mut SessionRecord> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    fn live_record(&self, address: &DeviceAddress) -> Option<&SessionRecord> {
        self.sessions
            .iter()
            .rev()
            .find(|s| &s.address == address && !s.closed)
    }

    fn live_record_mut(&mut self, address: &DeviceAddress) -> Option<&mut SessionRecord> {
        self.sessions
            .iter_mut()
            .rev()
            .find(|s| &s.address == address && !s.closed)
    }

    fn services_of(&self, address: &DeviceAddress) -> Vec<Service> {
        self.peripherals.get(address).cloned().unwrap_or_default()
    }

    fn find_characteristic(&self, address: &DeviceAddress, uuid: Uuid) -> Option<Characteristic> {
        self.peripherals
            .get(address)?
            .iter()
            .find_map(|s| s.characteristic(uuid))
            .cloned()
    }
}

/// Simulated transport stack.
///
/// Clones share the same simulated stack.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    /// Creates an initialized stack that stays silent until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                initialized: true,
                auto_respond: false,
                resume_succeeds: true,
                next_id: 1,
                peripherals: HashMap::new(),
                sessions: Vec::new(),
                operations: Vec::new(),
            })),
        }
    }

    /// Creates a stack whose adapter is unavailable.
    #[must_use]
    pub fn uninitialized() -> Self {
        let fake = Self::new();
        fake.set_initialized(false);
        fake
    }

    /// Makes every initiated operation complete through the session callback.
    #[must_use]
    pub fn with_auto_respond(self) -> Self {
        self.state.lock().auto_respond = true;
        self
    }

    /// Sets what `reconnect` on an existing session reports.
    #[must_use]
    pub fn with_resume(self, succeeds: bool) -> Self {
        self.state.lock().resume_succeeds = succeeds;
        self
    }

    /// Marks the adapter as available or not.
    pub fn set_initialized(&self, initialized: bool) {
        self.state.lock().initialized = initialized;
    }

    /// Adds a peripheral exposing `services`.
    pub fn add_peripheral(&self, address: impl Into<DeviceAddress>, services: Vec<Service>) {
        self.state.lock().peripherals.insert(address.into(), services);
    }

    // =========================================================================
    // Raising callbacks by hand
    // =========================================================================

    /// Raises `event` on the live session of `address`.
    ///
    /// Returns `false` if there is no live session or the dispatcher is gone.
    pub fn emit(&self, address: &DeviceAddress, event: TransportEvent) -> bool {
        let callback = self
            .state
            .lock()
            .live_record(address)
            .map(|r| r.callback.clone());

        callback.is_some_and(|cb| cb.deliver(event).is_ok())
    }

    /// Reports the link of `address` as up.
    pub fn link_up(&self, address: &DeviceAddress) -> bool {
        self.emit(
            address,
            TransportEvent::ConnectionStateChanged {
                status: GattStatus::SUCCESS,
                state: LinkState::Connected,
            },
        )
    }

    /// Reports the link of `address` as down.
    pub fn link_down(&self, address: &DeviceAddress) -> bool {
        self.emit(
            address,
            TransportEvent::ConnectionStateChanged {
                status: GattStatus::SUCCESS,
                state: LinkState::Disconnected,
            },
        )
    }

    /// Completes discovery for `address` with the peripheral's services.
    pub fn complete_discovery(&self, address: &DeviceAddress) -> bool {
        let services = {
            let mut state = self.state.lock();
            let services = state.services_of(address);
            match state.live_record_mut(address) {
                Some(record) => record.discovered = true,
                None => return false,
            }
            services
        };

        self.emit(
            address,
            TransportEvent::ServicesDiscovered {
                status: GattStatus::SUCCESS,
                services,
            },
        )
    }

    /// Fails discovery for `address` with `status`.
    pub fn fail_discovery(&self, address: &DeviceAddress, status: GattStatus) -> bool {
        self.emit(
            address,
            TransportEvent::ServicesDiscovered {
                status,
                services: Vec::new(),
            },
        )
    }

    /// Pushes `value` for characteristic `uuid` of `address`.
    pub fn notify(&self, address: &DeviceAddress, uuid: Uuid, value: impl Into<Vec<u8>>) -> bool {
        let characteristic = self
            .state
            .lock()
            .find_characteristic(address, uuid)
            .unwrap_or_else(|| Characteristic::new(Uuid::nil(), uuid));

        self.emit(
            address,
            TransportEvent::CharacteristicChanged {
                characteristic: characteristic.with_value(value),
            },
        )
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the operations initiated for `address`, oldest first.
    #[must_use]
    pub fn operations(&self, address: &DeviceAddress) -> Vec<FakeOperation> {
        self.state
            .lock()
            .operations
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, op)| op.clone())
            .collect()
    }

    /// Returns how many sessions were ever opened for `address`.
    #[must_use]
    pub fn sessions_opened(&self, address: &DeviceAddress) -> usize {
        self.state
            .lock()
            .sessions
            .iter()
            .filter(|s| &s.address == address)
            .count()
    }

    /// Returns how many sessions for `address` are not closed.
    #[must_use]
    pub fn live_sessions(&self, address: &DeviceAddress) -> usize {
        self.state
            .lock()
            .sessions
            .iter()
            .filter(|s| &s.address == address && !s.closed)
            .count()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FakeTransport {
    fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn open_session(
        &self,
        address: &DeviceAddress,
        callback: SessionCallback,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        let (id, auto_respond) = {
            let mut state = self.state.lock();
            if !state.initialized {
                return Err(TransportError::SessionUnavailable(
                    "adapter unavailable".to_string(),
                ));
            }

            let id = state.next_id;
            state.next_id += 1;
            state.sessions.push(SessionRecord {
                id,
                address: address.clone(),
                callback: callback.clone(),
                discovered: false,
                closed: false,
            });
            state.operations.push((address.clone(), FakeOperation::Open));
            (id, state.auto_respond)
        };

        if auto_respond {
            let _ = callback.on_connection_state_change(GattStatus::SUCCESS, LinkState::Connected);
        }

        Ok(Box::new(FakeSession {
            id,
            address: address.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

/// Session handed out by [`FakeTransport`].
#[derive(Debug)]
struct FakeSession {
    id: u64,
    address: DeviceAddress,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    /// Records `op` and returns the callback to answer with, if the
    /// session is still open. The callback is only returned when the
    /// stack auto-responds.
    fn initiate(&self, op: FakeOperation) -> Option<Option<SessionCallback>> {
        let mut state = self.state.lock();
        let record = state.record(self.id)?;
        if record.closed {
            return None;
        }
        let callback = state.auto_respond.then(|| record.callback.clone());
        state.operations.push((self.address.clone(), op));
        Some(callback)
    }
}

impl TransportSession for FakeSession {
    fn address(&self) -> &DeviceAddress {
        &self.address
    }

    fn reconnect(&self) -> bool {
        let resume = self.state.lock().resume_succeeds;
        let Some(callback) = self.initiate(FakeOperation::Reconnect) else {
            return false;
        };
        if resume && let Some(cb) = callback {
            let _ = cb.on_connection_state_change(GattStatus::SUCCESS, LinkState::Connected);
        }
        resume
    }

    fn disconnect(&self) {
        if let Some(Some(cb)) = self.initiate(FakeOperation::Disconnect) {
            let _ = cb.on_connection_state_change(GattStatus::SUCCESS, LinkState::Disconnected);
        }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        let already_closed = state.record(self.id).is_none_or(|r| r.closed);
        if already_closed {
            return;
        }
        if let Some(record) = state.record_mut(self.id) {
            record.closed = true;
        }
        state
            .operations
            .push((self.address.clone(), FakeOperation::Close));
    }

    fn discover_services(&self) -> bool {
        let Some(callback) = self.initiate(FakeOperation::DiscoverServices) else {
            return false;
        };
        if let Some(cb) = callback {
            let services = {
                let mut state = self.state.lock();
                if let Some(record) = state.record_mut(self.id) {
                    record.discovered = true;
                }
                state.services_of(&self.address)
            };
            let _ = cb.on_services_discovered(GattStatus::SUCCESS, services);
        }
        true
    }

    fn services(&self) -> Vec<Service> {
        let state = self.state.lock();
        match state.record(self.id) {
            Some(record) if record.discovered && !record.closed => {
                state.services_of(&self.address)
            }
            _ => Vec::new(),
        }
    }

    fn read_characteristic(&self, characteristic: &Characteristic) -> bool {
        let Some(callback) = self.initiate(FakeOperation::Read(characteristic.uuid())) else {
            return false;
        };
        if let Some(cb) = callback {
            let stored = self
                .state
                .lock()
                .find_characteristic(&self.address, characteristic.uuid())
                .unwrap_or_else(|| characteristic.clone());
            let _ = cb.on_characteristic_read(stored, GattStatus::SUCCESS);
        }
        true
    }

    fn write_characteristic(&self, characteristic: &Characteristic) -> bool {
        let op = FakeOperation::Write(characteristic.uuid(), characteristic.value().to_vec());
        let Some(callback) = self.initiate(op) else {
            return false;
        };
        if let Some(cb) = callback {
            let _ = cb.on_characteristic_write(characteristic.clone(), GattStatus::SUCCESS);
        }
        true
    }

    fn set_characteristic_notification(
        &self,
        characteristic: &Characteristic,
        enabled: bool,
    ) -> bool {
        self.initiate(FakeOperation::SetNotification(
            characteristic.uuid(),
            enabled,
        ))
        .is_some()
    }

    fn write_descriptor(&self, descriptor: &Descriptor) -> bool {
        let op = FakeOperation::WriteDescriptor {
            characteristic: descriptor.characteristic(),
            descriptor: descriptor.uuid(),
            value: descriptor.value().to_vec(),
        };
        let Some(callback) = self.initiate(op) else {
            return false;
        };
        if let Some(cb) = callback {
            let _ = cb.on_descriptor_write(descriptor.clone(), GattStatus::SUCCESS);
        }
        true
    }
}
