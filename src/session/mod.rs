// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session registry, the unit of multiplexing.
//!
//! At most one live transport session exists per device address. The
//! registry keeps sessions across disconnects so a later connect resumes
//! the same handle, and derives the known-device list from its own key
//! order.

mod registry;

pub use registry::{ConnectOutcome, SessionRegistry};
