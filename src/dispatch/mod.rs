// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event dispatch.
//!
//! The [`EventDispatcher`] is the only reader of the transport callback
//! channel. It converts raw [`TransportEvent`](crate::transport::TransportEvent)s
//! into [`DeviceEvent`](crate::event::DeviceEvent)s and keeps what it
//! drops or flags in [`Diagnostics`].
//!
//! | Raw event | Normalized event |
//! |---|---|
//! | link up | `Connected`, then discovery is initiated |
//! | link down | `Disconnected` |
//! | discovery succeeded | `ServicesReady` (empty services are integrity warnings) |
//! | discovery failed | none, status recorded |
//! | read succeeded | `DataRead` |
//! | read failed | none, failure counted |
//! | write acknowledged | `DataWritten` with status |
//! | value changed | `DataNotify` |
//! | descriptor read/write | none, status recorded |

mod diagnostics;
mod dispatcher;

pub use diagnostics::{DeviceDiagnostics, Diagnostics};
pub use dispatcher::EventDispatcher;
