// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consumer-side state machine turning notifications into readings.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

use crate::error::{GattError, Result};
use crate::event::{DeviceAddress, DeviceEvent};
use crate::manager::SensorHub;

use super::{DecoderCatalog, SubscriberDirectory};

/// Latest rendered value of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestReading {
    /// The decoder's rendering of its current reading.
    pub value: String,
    /// When the reading was last updated.
    pub updated_at: DateTime<Utc>,
    /// Notifications received since the reading was first created.
    pub notifications: u64,
}

/// What [`SensorBoard::handle_event`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardUpdate {
    /// A notification updated the device's reading.
    Reading(DeviceAddress),
    /// The device had no decoder; one was rebuilt from its services and
    /// the notification updated its reading.
    Reconstructed(DeviceAddress),
    /// The device had no decoder and none could be rebuilt.
    Dropped(DeviceAddress),
    /// The device disconnected and its decoder was marked stale.
    Disabled(DeviceAddress),
    /// Nothing to do for this event.
    Ignored,
}

/// Decoders and latest readings of every sensor the consumer tracks.
///
/// The board can be torn down and rebuilt at any time while the hub keeps
/// its sessions. A notification for a device the board does not know yet
/// rebuilds its decoder from the device's discovered services. Only
/// notifications from the sensor's data characteristic update a reading.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gattmux::event::{DeviceAddress, DeviceEvent};
/// use gattmux::manager::SensorHub;
/// use gattmux::subscriber::{BoardUpdate, SensorBoard};
/// use gattmux::transport::fake::FakeTransport;
/// use uuid::Uuid;
///
/// let hub = SensorHub::new(Arc::new(FakeTransport::new()));
/// let mut board = SensorBoard::new(hub);
///
/// // No session, so nothing to rebuild a decoder from.
/// let event = DeviceEvent::data_notify(DeviceAddress::new("AA"), Uuid::nil(), vec![1, 0]);
/// assert_eq!(board.handle_event(&event), BoardUpdate::Dropped(DeviceAddress::new("AA")));
/// assert!(board.latest_readings().is_empty());
/// ```
#[derive(Debug)]
pub struct SensorBoard {
    hub: SensorHub,
    catalog: DecoderCatalog,
    directory: SubscriberDirectory,
    readings: BTreeMap<DeviceAddress, LatestReading>,
}

impl SensorBoard {
    /// Creates a board using the hub's configured sensor profiles.
    #[must_use]
    pub fn new(hub: SensorHub) -> Self {
        let catalog = hub.config().catalog();
        Self::with_catalog(hub, catalog)
    }

    /// Creates a board with an explicit catalog.
    #[must_use]
    pub fn with_catalog(hub: SensorHub, catalog: DecoderCatalog) -> Self {
        Self {
            hub,
            catalog,
            directory: SubscriberDirectory::new(),
            readings: BTreeMap::new(),
        }
    }

    /// Returns the attached decoders.
    #[must_use]
    pub fn directory(&self) -> &SubscriberDirectory {
        &self.directory
    }

    /// Builds a decoder for each address and forgets previous readings.
    ///
    /// Returns the addresses a decoder was built for.
    pub fn create_sensors<I>(&mut self, addresses: I) -> Vec<DeviceAddress>
    where
        I: IntoIterator<Item = DeviceAddress>,
    {
        self.readings.clear();
        addresses
            .into_iter()
            .filter(|address| self.create_sensor(address))
            .collect()
    }

    /// Builds a decoder for a device from its discovered services.
    ///
    /// Returns `false` if the device has no session, discovery has not
    /// completed, or no known sensor was found.
    pub fn create_sensor(&mut self, address: &DeviceAddress) -> bool {
        let Ok(services) = self.hub.list_services(address) else {
            return false;
        };
        let Some(decoder) = self.catalog.build(&services) else {
            tracing::debug!(%address, services = services.len(), "No known sensor on device");
            return false;
        };

        tracing::debug!(%address, kind = %decoder.profile().kind, "Sensor created");
        self.directory.attach(address.clone(), decoder);
        true
    }

    /// Switches a device's sensor on and subscribes to its measurements.
    ///
    /// Writes the profile's enable value to the config characteristic,
    /// enables notifications locally, then writes the notify descriptor.
    /// Requires completed discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no session, no known sensor was
    /// discovered, or a step could not be initiated.
    pub fn activate(&self, address: &DeviceAddress) -> Result<()> {
        let services = self.hub.list_services(address)?;
        if services.is_empty() {
            return Err(GattError::ServicesNotDiscovered.into());
        }
        let profile = self
            .catalog
            .match_profile(&services)
            .ok_or(GattError::NoKnownSensor)?;
        let service = services
            .iter()
            .find(|s| s.uuid() == profile.service)
            .ok_or(GattError::ServiceNotFound(profile.service))?;

        let config = service
            .characteristic(profile.config)
            .ok_or(GattError::CharacteristicNotFound(profile.config))?
            .clone()
            .with_value(profile.enable_value.clone());
        let data = service
            .characteristic(profile.data)
            .ok_or(GattError::CharacteristicNotFound(profile.data))?;

        self.hub.write_characteristic(address, &config)?;
        self.hub.enable_notification(address, data, true)?;
        self.hub.write_notify_descriptor(address, data, true)?;

        tracing::info!(%address, kind = %profile.kind, "Sensor activated");
        Ok(())
    }

    /// Applies one normalized event.
    pub fn handle_event(&mut self, event: &DeviceEvent) -> BoardUpdate {
        match event {
            DeviceEvent::Disconnected { address } => {
                if self.directory.disable(address) {
                    BoardUpdate::Disabled(address.clone())
                } else {
                    BoardUpdate::Ignored
                }
            }
            DeviceEvent::DataNotify {
                address,
                characteristic,
                value,
            } => self.on_notify(address, *characteristic, value.as_deref()),
            _ => BoardUpdate::Ignored,
        }
    }

    fn on_notify(
        &mut self,
        address: &DeviceAddress,
        characteristic: Uuid,
        value: Option<&[u8]>,
    ) -> BoardUpdate {
        let reconstructed = if self.directory.contains(address) {
            false
        } else if self.create_sensor(address) {
            tracing::info!(%address, "Decoder rebuilt for notifying device");
            true
        } else {
            tracing::debug!(%address, "No decoder for notification, dropped");
            return BoardUpdate::Dropped(address.clone());
        };

        let Some(decoder) = self.directory.get_mut(address) else {
            return BoardUpdate::Dropped(address.clone());
        };
        if decoder.profile().data != characteristic {
            tracing::trace!(%address, %characteristic, "Notification not from the sensor data");
            return BoardUpdate::Ignored;
        }
        if let Some(payload) = value
            && let Err(e) = decoder.decode(payload)
        {
            tracing::warn!(%address, error = %e, "Notification payload not decoded");
        }
        let rendered = decoder.render();

        let now = Utc::now();
        self.readings
            .entry(address.clone())
            .and_modify(|r| {
                r.value.clone_from(&rendered);
                r.updated_at = now;
                r.notifications += 1;
            })
            .or_insert_with(|| LatestReading {
                value: rendered,
                updated_at: now,
                notifications: 1,
            });

        if reconstructed {
            BoardUpdate::Reconstructed(address.clone())
        } else {
            BoardUpdate::Reading(address.clone())
        }
    }

    /// Returns the latest reading of every device, ordered by address.
    #[must_use]
    pub fn latest_readings(&self) -> &BTreeMap<DeviceAddress, LatestReading> {
        &self.readings
    }

    /// Returns the latest reading of one device.
    #[must_use]
    pub fn latest(&self, address: &DeviceAddress) -> Option<&LatestReading> {
        self.readings.get(address)
    }

    /// Renders one `<address>: <value>` line per device.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (address, reading) in &self.readings {
            let _ = writeln!(out, "{address}: {}", reading.value);
        }
        out
    }

    /// Applies every event already queued on `receiver` and returns how many were applied.
    pub fn drain(&mut self, receiver: &mut broadcast::Receiver<DeviceEvent>) -> usize {
        let mut applied = 0;
        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    self.handle_event(&event);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Sensor board lagged behind the event stream");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return applied,
            }
        }
    }

    /// Applies events as they arrive until the event stream closes.
    ///
    /// Cancel the future to stop early; the board keeps its state.
    pub async fn run(&mut self, receiver: &mut broadcast::Receiver<DeviceEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.handle_event(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Sensor board lagged behind the event stream");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
