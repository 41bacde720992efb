// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing of raw transport callbacks to normalized events.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::{DeviceAddress, DeviceEvent, EventBus};
use crate::gatt::{GattStatus, LinkState, Service};
use crate::session::SessionRegistry;
use crate::transport::{TaggedEvent, TransportEvent};

use super::Diagnostics;

/// The single consumer of the transport callback channel.
///
/// Every session's callback feeds one channel; the dispatcher drains it,
/// turns each [`TaggedEvent`] into at most one [`DeviceEvent`] and
/// publishes that on the [`EventBus`]. Events of one device are handled
/// in the order they were delivered. Nothing is assumed about the order
/// across devices.
///
/// The dispatcher only holds a weak reference to the registry, so it
/// never keeps the sessions alive on its own.
#[derive(Debug)]
pub struct EventDispatcher {
    registry: Weak<SessionRegistry>,
    bus: EventBus,
    diagnostics: Arc<Diagnostics>,
}

impl EventDispatcher {
    /// Creates a dispatcher publishing on `bus`.
    #[must_use]
    pub fn new(
        registry: &Arc<SessionRegistry>,
        bus: EventBus,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            bus,
            diagnostics,
        }
    }

    /// Handles one raw event and publishes the resulting normalized event, if any.
    ///
    /// A `Connected` event is published before service discovery is
    /// initiated on the device's session. Events raised by a session that
    /// has since been replaced for the same address are dropped.
    pub fn handle(&self, tagged: TaggedEvent) -> Option<DeviceEvent> {
        let TaggedEvent {
            address,
            session,
            event,
        } = tagged;
        if self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.is_stale(&address, session))
        {
            tracing::debug!(%address, session, "Dropping event from a replaced session");
            return None;
        }
        let normalized = self.normalize(&address, event)?;

        let receivers = self.bus.publish_counted(normalized.clone());
        tracing::trace!(%address, kind = ?normalized.kind(), receivers, "Published event");

        if matches!(normalized, DeviceEvent::Connected { .. }) {
            self.start_discovery(&address);
        }

        Some(normalized)
    }

    /// Runs the dispatch loop on a new task.
    ///
    /// The loop ends when every callback sender is gone or when the
    /// registry has been dropped.
    pub fn spawn(self, mut receiver: mpsc::UnboundedReceiver<TaggedEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::debug!("Event dispatcher started");

            while let Some(tagged) = receiver.recv().await {
                if self.registry.strong_count() == 0 {
                    break;
                }
                self.handle(tagged);
            }

            tracing::debug!("Event dispatcher stopped");
        })
    }

    fn normalize(&self, address: &DeviceAddress, event: TransportEvent) -> Option<DeviceEvent> {
        match event {
            TransportEvent::ConnectionStateChanged { status, state } => {
                Self::on_connection_state_change(address, status, state)
            }
            TransportEvent::ServicesDiscovered { status, services } => {
                self.on_services_discovered(address, status, &services)
            }
            TransportEvent::CharacteristicRead {
                characteristic,
                status,
            } => {
                if status.is_success() {
                    Some(DeviceEvent::data_read(
                        address.clone(),
                        characteristic.uuid(),
                        characteristic.value().to_vec(),
                    ))
                } else {
                    // Read failures produce no event.
                    tracing::debug!(
                        %address,
                        characteristic = %characteristic.uuid(),
                        ?status,
                        "Characteristic read failed"
                    );
                    self.diagnostics.record_read_failure(address);
                    None
                }
            }
            TransportEvent::CharacteristicWrite {
                characteristic,
                status,
            } => {
                if !status.is_success() {
                    tracing::debug!(
                        %address,
                        characteristic = %characteristic.uuid(),
                        ?status,
                        "Characteristic write reported failure"
                    );
                }
                self.diagnostics.record_write_status(address, status);
                Some(DeviceEvent::data_written(
                    address.clone(),
                    characteristic.uuid(),
                    characteristic.value().to_vec(),
                    status,
                ))
            }
            TransportEvent::CharacteristicChanged { characteristic } => {
                self.diagnostics.record_notification(address);
                Some(DeviceEvent::data_notify(
                    address.clone(),
                    characteristic.uuid(),
                    characteristic.value().to_vec(),
                ))
            }
            TransportEvent::DescriptorRead { descriptor, status }
            | TransportEvent::DescriptorWrite { descriptor, status } => {
                tracing::debug!(
                    %address,
                    characteristic = %descriptor.characteristic(),
                    descriptor = %descriptor.uuid(),
                    ?status,
                    "Descriptor operation completed"
                );
                self.diagnostics.record_descriptor_status(address, status);
                None
            }
        }
    }

    fn on_connection_state_change(
        address: &DeviceAddress,
        status: GattStatus,
        state: LinkState,
    ) -> Option<DeviceEvent> {
        match state {
            LinkState::Connected => {
                tracing::info!(%address, ?status, "Device connected");
                Some(DeviceEvent::connected(address.clone()))
            }
            LinkState::Disconnected => {
                tracing::info!(%address, ?status, "Device disconnected");
                Some(DeviceEvent::disconnected(address.clone()))
            }
            LinkState::Connecting | LinkState::Disconnecting => {
                tracing::trace!(%address, ?state, "Transitional link state");
                None
            }
        }
    }

    fn on_services_discovered(
        &self,
        address: &DeviceAddress,
        status: GattStatus,
        services: &[Service],
    ) -> Option<DeviceEvent> {
        if !status.is_success() {
            tracing::warn!(%address, ?status, "Service discovery failed");
            self.diagnostics.record_discovery_failure(address, status);
            return None;
        }

        let empty: Vec<_> = services
            .iter()
            .filter(|s| s.is_empty())
            .map(Service::uuid)
            .collect();
        for service in &empty {
            tracing::warn!(%address, %service, "Service reported without characteristics");
        }
        self.diagnostics.record_integrity_warnings(address, empty);

        tracing::debug!(%address, services = services.len(), "Services discovered");
        Some(DeviceEvent::services_ready(address.clone()))
    }

    fn start_discovery(&self, address: &DeviceAddress) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        match registry.session(address) {
            Ok(session) => {
                if session.discover_services() {
                    tracing::debug!(%address, "Service discovery initiated");
                } else {
                    tracing::warn!(%address, "Transport rejected service discovery");
                }
            }
            Err(_) => {
                tracing::warn!(%address, "Connected event for a device without session");
            }
        }
    }
}
