// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized, device-tagged events.
//!
//! The transport reports everything through one callback stream shared by
//! all sessions. The [`EventDispatcher`](crate::dispatch::EventDispatcher)
//! turns that stream into [`DeviceEvent`]s keyed by [`DeviceAddress`] and
//! publishes them on an [`EventBus`].
//!
//! # Examples
//!
//! ```
//! use gattmux::event::{DeviceAddress, DeviceEvent, EventBus};
//!
//! let bus = EventBus::new();
//!
//! // Subscribe to events
//! let mut rx = bus.subscribe();
//!
//! // Publish an event
//! bus.publish(DeviceEvent::connected(DeviceAddress::new("AA:BB")));
//! ```

mod device_address;
mod device_event;
mod event_bus;

pub use device_address::DeviceAddress;
pub use device_event::{DeviceEvent, EventKind};
pub use event_bus::EventBus;
