// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consumer side of the event stream.
//!
//! A [`SensorBoard`] listens to [`DeviceEvent`](crate::event::DeviceEvent)s
//! and keeps one [`Decoder`] per device in a [`SubscriberDirectory`].
//! Decoders are picked by exact service UUID match in a
//! [`DecoderCatalog`] built from [`SensorProfile`]s.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gattmux::manager::SensorHub;
//! use gattmux::subscriber::SensorBoard;
//! use gattmux::transport::fake::FakeTransport;
//!
//! # async fn example() -> gattmux::Result<()> {
//! let hub = SensorHub::new(Arc::new(FakeTransport::new().with_auto_respond()));
//! hub.initialize()?;
//!
//! let mut events = hub.subscribe();
//! let mut board = SensorBoard::new(hub.clone());
//! board.create_sensors(hub.known_devices());
//! board.run(&mut events).await;
//! # Ok(())
//! # }
//! ```

mod board;
mod decoder;
mod directory;
mod luxometer;

pub use board::{BoardUpdate, LatestReading, SensorBoard};
pub use decoder::{Decoder, DecoderCatalog, SensorKind, SensorProfile};
pub use directory::SubscriberDirectory;
pub use luxometer::LuxometerDecoder;
