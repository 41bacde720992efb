// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `gattmux` - concurrent GATT sensor sessions over one callback stream.
//!
//! BLE stacks report the outcome of every operation on every peripheral
//! through a single asynchronous callback interface. This library keeps
//! one session per device address and turns that shared stream into
//! normalized events tagged with the device they belong to.
//!
//! # Components
//!
//! - **Session registry** ([`session`]): at most one live session per address,
//!   kept across disconnects so a later connect resumes it
//! - **Event dispatcher** ([`dispatch`]): drains the callback channel and
//!   publishes [`DeviceEvent`]s
//! - **Command façade** ([`SensorHub`]): connect, read, write, subscribe and
//!   enumerate services, failing cleanly when a device has no session
//! - **Subscribers** ([`subscriber`]): per-device decoders and the latest
//!   reading of each sensor
//!
//! The platform stack plugs in through the [`Transport`] and
//! [`TransportSession`] traits. [`transport::fake::FakeTransport`] is a
//! simulated stack for tests and demos.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use gattmux::{DeviceAddress, DeviceEvent, SensorBoard, SensorHub};
//! use gattmux::transport::fake::FakeTransport;
//!
//! #[tokio::main]
//! async fn main() -> gattmux::Result<()> {
//!     let hub = SensorHub::new(Arc::new(FakeTransport::new().with_auto_respond()));
//!     hub.initialize()?;
//!
//!     let mut events = hub.subscribe();
//!     let address = DeviceAddress::new("B0:B4:48:C9:4E:01");
//!     hub.connect(&address)?;
//!
//!     let mut board = SensorBoard::new(hub.clone());
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::ServicesReady { address } = &event {
//!             board.create_sensor(address);
//!             board.activate(address)?;
//!         }
//!         board.handle_event(&event);
//!         print!("{}", board.render());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! - Failed characteristic reads produce no event; they are only counted
//!   in [`DeviceDiagnostics`].
//! - Pending operations have no timeout. A device whose stack never calls
//!   back stays pending until it is disconnected or closed.

pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod gatt;
pub mod manager;
pub mod session;
pub mod subscriber;
pub mod transport;

pub use dispatch::{DeviceDiagnostics, Diagnostics, EventDispatcher};
pub use error::{ConfigError, DecodeError, Error, GattError, Result, TransportError};
pub use event::{DeviceAddress, DeviceEvent, EventBus, EventKind};
pub use gatt::{Characteristic, Descriptor, GattStatus, LinkState, Service};
pub use manager::{HubConfig, SensorHub};
pub use session::{ConnectOutcome, SessionRegistry};
pub use subscriber::{
    BoardUpdate, Decoder, DecoderCatalog, LatestReading, LuxometerDecoder, SensorBoard, SensorKind,
    SensorProfile, SubscriberDirectory,
};
pub use transport::{SessionCallback, TaggedEvent, Transport, TransportEvent, TransportSession};
