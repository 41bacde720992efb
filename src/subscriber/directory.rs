// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device decoder lookup.

use indexmap::IndexMap;

use crate::event::DeviceAddress;

use super::Decoder;

/// Decoders attached to devices by the consumer layer.
///
/// A missing entry is a normal condition: the directory may have been
/// rebuilt while transport sessions stayed alive. Entries are disabled,
/// not removed, when their device disconnects.
#[derive(Debug, Default)]
pub struct SubscriberDirectory {
    decoders: IndexMap<DeviceAddress, Box<dyn Decoder>>,
}

impl SubscriberDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a decoder, returning the one it replaces.
    pub fn attach(
        &mut self,
        address: DeviceAddress,
        decoder: Box<dyn Decoder>,
    ) -> Option<Box<dyn Decoder>> {
        self.decoders.insert(address, decoder)
    }

    /// Returns the decoder attached to `address`.
    #[must_use]
    pub fn get(&self, address: &DeviceAddress) -> Option<&dyn Decoder> {
        self.decoders.get(address).map(|d| &**d)
    }

    /// Returns the decoder attached to `address` for updating.
    pub fn get_mut(&mut self, address: &DeviceAddress) -> Option<&mut (dyn Decoder + 'static)> {
        self.decoders.get_mut(address).map(|d| &mut **d)
    }

    /// Removes the decoder attached to `address`.
    pub fn detach(&mut self, address: &DeviceAddress) -> Option<Box<dyn Decoder>> {
        self.decoders.shift_remove(address)
    }

    /// Marks the decoder of `address` as stale. Returns `false` if there is none.
    pub fn disable(&mut self, address: &DeviceAddress) -> bool {
        match self.decoders.get_mut(address) {
            Some(decoder) => {
                decoder.disable();
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a decoder is attached to `address`.
    #[must_use]
    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.decoders.contains_key(address)
    }

    /// Returns the addresses with a decoder, in attach order.
    pub fn addresses(&self) -> impl Iterator<Item = &DeviceAddress> {
        self.decoders.keys()
    }

    /// Returns the number of attached decoders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if no decoder is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Removes every decoder.
    pub fn clear(&mut self) {
        self.decoders.clear();
    }
}
