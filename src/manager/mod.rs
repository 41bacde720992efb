// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sensor hub for coordinating many BLE peripherals.
//!
//! The [`SensorHub`] is the command façade applications talk to. It owns
//! the session registry and the dispatcher, and exposes:
//!
//! - **Connection management**: connect, disconnect and close, per device or for all
//! - **GATT operations**: read, write, notification enable and descriptor write
//! - **Service lookup**: the attribute table discovered for each device
//! - **Event stream**: normalized, device-tagged events via broadcast channels
//!
//! # Examples
//!
//! ## Event Subscription
//!
//! ```no_run
//! use std::sync::Arc;
//! use gattmux::event::DeviceEvent;
//! use gattmux::manager::SensorHub;
//! use gattmux::transport::fake::FakeTransport;
//!
//! # fn example() {
//! let hub = SensorHub::new(Arc::new(FakeTransport::new()));
//! let mut events = hub.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             DeviceEvent::DataNotify { address, value, .. } => {
//!                 println!("{address} pushed {value:?}");
//!             }
//!             DeviceEvent::Disconnected { address } => {
//!                 println!("{address} went away");
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```
//! use std::sync::Arc;
//! use gattmux::manager::{HubConfig, SensorHub};
//! use gattmux::transport::fake::FakeTransport;
//!
//! let config = HubConfig::from_json_str(r#"{ "event_capacity": 1024 }"#).unwrap();
//! let hub = SensorHub::with_config(Arc::new(FakeTransport::new()), config).unwrap();
//! assert_eq!(hub.config().event_capacity, 1024);
//! ```

mod hub;
mod hub_config;

pub use hub::SensorHub;
pub use hub_config::HubConfig;
