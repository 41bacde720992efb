// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport status codes and link states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status code attached to a completed GATT operation.
///
/// Zero means success; every other value is a stack-specific failure code
/// kept verbatim for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GattStatus(i32);

impl GattStatus {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0);

    /// Generic failure.
    pub const FAILURE: Self = Self(0x101);

    /// Wraps a raw status code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw status code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Returns `true` if the operation succeeded.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl Default for GattStatus {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Debug for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            f.write_str("GattStatus(SUCCESS)")
        } else {
            write!(f, "GattStatus({:#x})", self.0)
        }
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Link state reported by a connection state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    /// No link.
    Disconnected,
    /// Link establishment in progress.
    Connecting,
    /// Link is up.
    Connected,
    /// Link teardown in progress.
    Disconnecting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status() {
        assert!(GattStatus::SUCCESS.is_success());
        assert!(!GattStatus::FAILURE.is_success());
        assert!(!GattStatus::from_code(133).is_success());
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", GattStatus::SUCCESS), "GattStatus(SUCCESS)");
        assert_eq!(format!("{:?}", GattStatus::from_code(133)), "GattStatus(0x85)");
    }

    #[test]
    fn code_round_trip() {
        assert_eq!(GattStatus::from_code(8).code(), 8);
    }
}
