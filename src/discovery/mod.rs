// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Candidate collection from a BLE scan.
//!
//! The scanner itself belongs to the platform; it only has to push
//! [`Advertisement`]s into a channel. This module keeps the ones whose
//! advertised name is on an allow-list, de-duplicated by address, for the
//! duration of one scan period. The multiplexer never filters: whatever
//! ends up in [`DiscoveredDevices`] is what the caller chooses to connect.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use gattmux::discovery::{Advertisement, DiscoveryOptions, collect_candidates};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (tx, mut rx) = mpsc::channel(16);
//! tx.send(Advertisement::new("AA:BB", Some("SensorTag"), -60)).await.unwrap();
//! tx.send(Advertisement::new("CC:DD", Some("Headphones"), -40)).await.unwrap();
//! drop(tx);
//!
//! let options = DiscoveryOptions::new().with_period(Duration::from_secs(1));
//! let found = collect_candidates(&mut rx, &options).await;
//!
//! assert_eq!(found.len(), 1);
//! # }
//! ```

use std::fmt::Write as _;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::event::DeviceAddress;

/// Default scan period.
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(6);

/// Advertised names accepted by default.
pub const DEFAULT_ALLOWED_NAMES: [&str; 3] = ["SensorTag", "TI BLE Sensor Tag", "CC2650 SensorTag"];

/// One advertisement seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// The advertiser's address.
    pub address: DeviceAddress,
    /// The advertised local name, if any.
    pub name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl Advertisement {
    /// Creates an advertisement.
    #[must_use]
    pub fn new(address: impl Into<DeviceAddress>, name: Option<&str>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            name: name.map(str::to_string),
            rssi,
        }
    }
}

/// Allow-list of advertised names.
///
/// Names are compared exactly. Devices that advertise no name are
/// never accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    allowed: Vec<String>,
}

impl NameFilter {
    /// Creates a filter accepting `names`.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the accepted names.
    #[must_use]
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Returns `true` if the advertisement carries an accepted name.
    #[must_use]
    pub fn accepts(&self, advertisement: &Advertisement) -> bool {
        advertisement
            .name
            .as_deref()
            .is_some_and(|name| self.allowed.iter().any(|a| a == name))
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_NAMES)
    }
}

/// Options for one scan.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    period: Option<Duration>,
    filter: NameFilter,
}

impl DiscoveryOptions {
    /// Creates options with the default period and name filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long to listen for advertisements.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    /// Replaces the name filter.
    #[must_use]
    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Returns the scan period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period.unwrap_or(DEFAULT_SCAN_PERIOD)
    }

    /// Returns the name filter.
    #[must_use]
    pub fn filter(&self) -> &NameFilter {
        &self.filter
    }
}

/// Devices found during a scan, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredDevices {
    devices: IndexMap<DeviceAddress, Advertisement>,
}

impl DiscoveredDevices {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an advertisement. Returns `true` if the address is new.
    ///
    /// A repeated address keeps its position and takes the latest name and
    /// signal strength.
    pub fn insert(&mut self, advertisement: Advertisement) -> bool {
        self.devices
            .insert(advertisement.address.clone(), advertisement)
            .is_none()
    }

    /// Returns the advertisement last seen for `address`.
    #[must_use]
    pub fn get(&self, address: &DeviceAddress) -> Option<&Advertisement> {
        self.devices.get(address)
    }

    /// Returns the addresses found.
    #[must_use]
    pub fn addresses(&self) -> Vec<DeviceAddress> {
        self.devices.keys().cloned().collect()
    }

    /// Iterates over the advertisements.
    pub fn iter(&self) -> impl Iterator<Item = &Advertisement> {
        self.devices.values()
    }

    /// Returns the number of devices found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forgets every device.
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Renders one `Available: <address>` line per device.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for address in self.devices.keys() {
            let _ = writeln!(out, "Available: {address}");
        }
        out
    }
}

/// Collects accepted advertisements until the scan period elapses or the
/// scanner closes its channel.
pub async fn collect_candidates(
    receiver: &mut mpsc::Receiver<Advertisement>,
    options: &DiscoveryOptions,
) -> DiscoveredDevices {
    let period = options.period();
    let deadline = tokio::time::Instant::now() + period;
    let mut found = DiscoveredDevices::new();

    tracing::info!(period_ms = period.as_millis(), "Collecting scan candidates");

    loop {
        match tokio::time::timeout_at(deadline, receiver.recv()).await {
            Ok(Some(advertisement)) => {
                if !options.filter().accepts(&advertisement) {
                    tracing::trace!(address = %advertisement.address, "Advertisement filtered out");
                    continue;
                }
                let address = advertisement.address.clone();
                if found.insert(advertisement) {
                    tracing::debug!(%address, "Scan candidate found");
                }
            }
            Ok(None) => {
                tracing::debug!("Scanner closed its channel");
                break;
            }
            Err(_) => break,
        }
    }

    tracing::info!(count = found.len(), "Scan finished");
    found
}
