// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GATT attribute model.
//!
//! Peripherals expose data as services holding characteristics, which in
//! turn carry descriptors. The multiplexer never interprets attribute
//! values; it only routes them.

mod attribute;
mod status;

use uuid::Uuid;

pub use attribute::{Characteristic, Descriptor, Service};
pub use status::{GattStatus, LinkState};

/// UUID of the standard client characteristic configuration descriptor.
pub const CLIENT_CHARACTERISTIC_CONFIG: Uuid =
    Uuid::from_u128(0x0000_2902_0000_1000_8000_0080_5f9b_34fb);

/// CCCD value that turns server-side notifications on.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// CCCD value that turns server-side notifications off.
pub const DISABLE_NOTIFICATION_VALUE: [u8; 2] = [0x00, 0x00];
