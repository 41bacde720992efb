// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary with the underlying wireless stack.
//!
//! The stack is modelled by two traits:
//!
//! - [`Transport`]: the stack itself, able to open one [`TransportSession`]
//!   per device address.
//! - [`TransportSession`]: a per-device handle that *initiates* connect,
//!   discovery, read, write and descriptor operations. Initiation returns
//!   immediately; every outcome arrives later as a [`TransportEvent`].
//!
//! Every session reports through a [`SessionCallback`] handed to it at
//! creation. All callbacks feed one channel, and each callback is bound to
//! exactly one device address, so the dispatcher can tag every event with
//! its origin without inspecting the event itself.
//!
//! ```text
//! session(AA) ──callback(AA)──┐
//! session(BB) ──callback(BB)──┼──▶ mpsc ──▶ EventDispatcher ──▶ EventBus
//! session(CC) ──callback(CC)──┘
//! ```

pub mod fake;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;
use crate::event::DeviceAddress;
use crate::gatt::{Characteristic, Descriptor, GattStatus, LinkState, Service};

/// The underlying wireless stack.
pub trait Transport: Send + Sync {
    /// Returns `true` if the stack (adapter) is available.
    fn is_initialized(&self) -> bool;

    /// Creates a session bound to `address` and starts connecting it.
    ///
    /// All events for the session must be reported through `callback`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack cannot create a session for the address.
    fn open_session(
        &self,
        address: &DeviceAddress,
        callback: SessionCallback,
    ) -> Result<Box<dyn TransportSession>, TransportError>;
}

/// A per-device session obtained from the [`Transport`].
///
/// Methods returning `bool` report whether the operation was *initiated*,
/// not whether it succeeded.
pub trait TransportSession: Send + Sync {
    /// Returns the address this session is bound to.
    fn address(&self) -> &DeviceAddress;

    /// Asks the stack to re-establish the link with the existing session.
    fn reconnect(&self) -> bool;

    /// Requests disconnection. The session remains usable for a later reconnect.
    fn disconnect(&self);

    /// Releases the session's resources. The session must not be used afterwards.
    fn close(&self);

    /// Starts service discovery.
    fn discover_services(&self) -> bool;

    /// Returns the services found by the last completed discovery.
    ///
    /// Empty until discovery has completed.
    fn services(&self) -> Vec<Service>;

    /// Returns a discovered service by UUID.
    fn service(&self, uuid: Uuid) -> Option<Service> {
        self.services().into_iter().find(|s| s.uuid() == uuid)
    }

    /// Starts reading a characteristic.
    fn read_characteristic(&self, characteristic: &Characteristic) -> bool;

    /// Starts writing the characteristic's local value.
    fn write_characteristic(&self, characteristic: &Characteristic) -> bool;

    /// Enables or disables notification delivery locally for a characteristic.
    fn set_characteristic_notification(&self, characteristic: &Characteristic, enabled: bool)
    -> bool;

    /// Starts writing the descriptor's local value.
    fn write_descriptor(&self, descriptor: &Descriptor) -> bool;
}

/// A raw asynchronous event raised by a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link state changed.
    ConnectionStateChanged {
        /// Status of the transition.
        status: GattStatus,
        /// The new link state.
        state: LinkState,
    },

    /// Service discovery finished.
    ServicesDiscovered {
        /// Discovery status.
        status: GattStatus,
        /// Services found, empty on failure.
        services: Vec<Service>,
    },

    /// A characteristic read finished.
    CharacteristicRead {
        /// The characteristic, holding the value read.
        characteristic: Characteristic,
        /// Read status.
        status: GattStatus,
    },

    /// A characteristic write finished.
    CharacteristicWrite {
        /// The characteristic that was written.
        characteristic: Characteristic,
        /// Write status.
        status: GattStatus,
    },

    /// The device pushed a new value.
    CharacteristicChanged {
        /// The characteristic, holding the pushed value.
        characteristic: Characteristic,
    },

    /// A descriptor read finished.
    DescriptorRead {
        /// The descriptor that was read.
        descriptor: Descriptor,
        /// Read status.
        status: GattStatus,
    },

    /// A descriptor write finished.
    DescriptorWrite {
        /// The descriptor that was written.
        descriptor: Descriptor,
        /// Write status.
        status: GattStatus,
    },
}

/// A [`TransportEvent`] tagged with the session that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    /// The originating device.
    pub address: DeviceAddress,
    /// Generation of the originating session, see [`SessionCallback::session`].
    pub session: u64,
    /// The raw event.
    pub event: TransportEvent,
}

/// Callback handle given to a [`TransportSession`] at creation.
///
/// Cloning is cheap. Delivery never blocks, so a callback may be invoked
/// from any thread the stack uses, including while a command holds the
/// session registry.
///
/// A session replaced for the same address keeps its old callback. Events
/// it still raises carry the old generation, and the dispatcher drops them
/// once a newer session is registered for the address.
#[derive(Debug, Clone)]
pub struct SessionCallback {
    address: DeviceAddress,
    session: u64,
    sender: mpsc::UnboundedSender<TaggedEvent>,
}

impl SessionCallback {
    /// Creates a callback bound to `address` for session generation `session`.
    #[must_use]
    pub fn new(
        address: DeviceAddress,
        session: u64,
        sender: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self {
            address,
            session,
            sender,
        }
    }

    /// Returns the address every delivered event is tagged with.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Returns the session generation every delivered event is tagged with.
    #[must_use]
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Delivers a raw event to the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ChannelClosed`] if the dispatcher is gone.
    pub fn deliver(&self, event: TransportEvent) -> Result<(), TransportError> {
        self.sender
            .send(TaggedEvent {
                address: self.address.clone(),
                session: self.session,
                event,
            })
            .map_err(|_| TransportError::ChannelClosed(self.address.to_string()))
    }

    /// Reports a link state change.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is gone.
    pub fn on_connection_state_change(
        &self,
        status: GattStatus,
        state: LinkState,
    ) -> Result<(), TransportError> {
        self.deliver(TransportEvent::ConnectionStateChanged { status, state })
    }

    /// Reports the end of service discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is gone.
    pub fn on_services_discovered(
        &self,
        status: GattStatus,
        services: Vec<Service>,
    ) -> Result<(), TransportError> {
        self.deliver(TransportEvent::ServicesDiscovered { status, services })
    }

    /// Reports the end of a characteristic read.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is gone.
    pub fn on_characteristic_read(
        &self,
        characteristic: Characteristic,
        status: GattStatus,
    ) -> Result<(), TransportError> {
        self.deliver(TransportEvent::CharacteristicRead {
            characteristic,
            status,
        })
    }

    /// Reports the end of a characteristic write.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is gone.
    pub fn on_characteristic_write(
        &self,
        characteristic: Characteristic,
        status: GattStatus,
    ) -> Result<(), TransportError> {
        self.deliver(TransportEvent::CharacteristicWrite {
            characteristic,
            status,
        })
    }

    /// Reports an unsolicited value push.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is gone.
    pub fn on_characteristic_changed(
        &self,
        characteristic: Characteristic,
    ) -> Result<(), TransportError> {
        self.deliver(TransportEvent::CharacteristicChanged { characteristic })
    }

    /// Reports the end of a descriptor read.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is gone.
    pub fn on_descriptor_read(
        &self,
        descriptor: Descriptor,
        status: GattStatus,
    ) -> Result<(), TransportError> {
        self.deliver(TransportEvent::DescriptorRead { descriptor, status })
    }

    /// Reports the end of a descriptor write.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is gone.
    pub fn on_descriptor_write(
        &self,
        descriptor: Descriptor,
        status: GattStatus,
    ) -> Result<(), TransportError> {
        self.deliver(TransportEvent::DescriptorWrite { descriptor, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_tags_events_with_its_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = SessionCallback::new(DeviceAddress::new("AA:BB"), 1, tx);

        callback
            .on_connection_state_change(GattStatus::SUCCESS, LinkState::Connected)
            .unwrap();

        let tagged = rx.try_recv().unwrap();
        assert_eq!(tagged.address, DeviceAddress::new("AA:BB"));
        assert_eq!(tagged.session, 1);
        assert_eq!(
            tagged.event,
            TransportEvent::ConnectionStateChanged {
                status: GattStatus::SUCCESS,
                state: LinkState::Connected,
            }
        );
    }

    #[test]
    fn clones_share_the_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let aa = SessionCallback::new(DeviceAddress::new("AA"), 1, tx.clone());
        let bb = SessionCallback::new(DeviceAddress::new("BB"), 2, tx);

        bb.on_characteristic_changed(Characteristic::new(Uuid::nil(), Uuid::nil()))
            .unwrap();
        aa.clone()
            .on_characteristic_changed(Characteristic::new(Uuid::nil(), Uuid::nil()))
            .unwrap();

        assert_eq!(rx.try_recv().unwrap().address, DeviceAddress::new("BB"));
        assert_eq!(rx.try_recv().unwrap().address, DeviceAddress::new("AA"));
    }

    #[test]
    fn deliver_fails_when_dispatcher_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = SessionCallback::new(DeviceAddress::new("AA"), 1, tx);
        drop(rx);

        let result = callback.on_connection_state_change(GattStatus::SUCCESS, LinkState::Connected);
        assert!(matches!(result, Err(TransportError::ChannelClosed(_))));
    }
}
