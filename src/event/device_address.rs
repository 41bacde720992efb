// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Stable key for a physical peripheral.
///
/// This is the transport address of the device (for Bluetooth LE, its
/// MAC address). The value is opaque to the multiplexer: it is only
/// compared, hashed and displayed. It is the sole key for every session
/// and subscriber lookup.
///
/// # Examples
///
/// ```
/// use gattmux::event::DeviceAddress;
///
/// let address = DeviceAddress::new("B0:B4:48:C0:5D:01");
/// assert_eq!(address.as_str(), "B0:B4:48:C0:5D:01");
///
/// let parsed: DeviceAddress = "B0:B4:48:C0:5D:01".parse().unwrap();
/// assert_eq!(parsed, address);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Creates an address from its string form.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the address is empty and cannot key a session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAddress({})", self.0)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Self::new(s);
        if address.is_empty() {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        Ok(address)
    }
}

impl From<&str> for DeviceAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for DeviceAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl AsRef<str> for DeviceAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_value() {
        assert_eq!(DeviceAddress::new("AA:BB"), DeviceAddress::from("AA:BB"));
        assert_ne!(DeviceAddress::new("AA:BB"), DeviceAddress::new("AA:BC"));
    }

    #[test]
    fn parse_rejects_blank() {
        assert!(matches!(
            "   ".parse::<DeviceAddress>(),
            Err(Error::InvalidAddress(_))
        ));
        assert!("AA:BB".parse::<DeviceAddress>().is_ok());
    }

    #[test]
    fn debug_format() {
        let address = DeviceAddress::new("AA:BB");
        assert_eq!(format!("{address:?}"), "DeviceAddress(AA:BB)");
    }

    #[test]
    fn serializes_as_plain_string() {
        let address = DeviceAddress::new("AA:BB");
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"AA:BB\"");
    }

    #[test]
    fn hashable() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DeviceAddress::new("AA"));
        set.insert(DeviceAddress::new("AA"));
        assert_eq!(set.len(), 1);
    }
}
