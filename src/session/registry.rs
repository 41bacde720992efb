// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of transport sessions keyed by device address.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::DeviceAddress;
use crate::transport::{SessionCallback, TaggedEvent, Transport, TransportSession};

/// How a [`SessionRegistry::connect`] call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The existing session accepted to reconnect.
    Resumed,
    /// A new session was opened for the device.
    Created,
}

/// A registered session and the local state attached to it.
struct SessionEntry {
    session: Arc<dyn TransportSession>,
    /// Generation the session's callback tags its events with.
    generation: u64,
    /// Characteristics with notification delivery enabled locally.
    notifying: HashSet<Uuid>,
}

impl SessionEntry {
    fn new(session: Arc<dyn TransportSession>, generation: u64) -> Self {
        Self {
            session,
            generation,
            notifying: HashSet::new(),
        }
    }
}

/// Owner of every transport session in the process.
///
/// The registry is a single ordered map from [`DeviceAddress`] to session.
/// Its key order is the order in which devices were first connected, so
/// the known-device list is derived from it and can never disagree with
/// the set of live sessions.
///
/// Entries survive disconnection so that a later [`connect`](Self::connect)
/// can resume the same underlying session. Only [`close`](Self::close) and
/// [`close_all`](Self::close_all) release them.
///
/// # Thread Safety
///
/// Commands run on the caller's task while the dispatcher reads the
/// registry from its own task. Access goes through a `parking_lot::RwLock`
/// that is never held across an `.await`.
pub struct SessionRegistry {
    transport: Arc<dyn Transport>,
    callbacks: mpsc::UnboundedSender<TaggedEvent>,
    entries: RwLock<IndexMap<DeviceAddress, SessionEntry>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry.
    ///
    /// Every session opened by this registry reports through a
    /// [`SessionCallback`] feeding `callbacks`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        callbacks: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self {
            transport,
            callbacks,
            entries: RwLock::new(IndexMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Returns `true` if the transport stack is available.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.transport.is_initialized()
    }

    /// Starts connecting to a device.
    ///
    /// If a session is already registered for `address`, it is asked to
    /// reconnect. When the transport refuses, the stale session is closed
    /// and a fresh one takes its place, keeping the device's position in
    /// the known-device list.
    ///
    /// Success means the attempt was initiated. The outcome arrives later
    /// as a `Connected` or `Disconnected` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the stack is unavailable,
    /// [`Error::InvalidAddress`] for an empty address, or a transport error
    /// if no session could be opened.
    pub fn connect(&self, address: &DeviceAddress) -> Result<ConnectOutcome> {
        if !self.transport.is_initialized() {
            tracing::warn!(%address, "Transport not initialized, cannot connect");
            return Err(Error::NotInitialized);
        }
        if address.is_empty() {
            tracing::warn!("Refusing to connect to an unspecified address");
            return Err(Error::InvalidAddress(address.to_string()));
        }

        let mut entries = self.entries.write();

        if let Some(entry) = entries.get(address) {
            tracing::debug!(%address, "Trying to resume existing session");
            if entry.session.reconnect() {
                return Ok(ConnectOutcome::Resumed);
            }
            tracing::debug!(%address, "Session refused to resume, replacing it");
            entry.session.close();
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let callback = SessionCallback::new(address.clone(), generation, self.callbacks.clone());
        let opened = self.transport.open_session(address, callback);
        let session: Arc<dyn TransportSession> = match opened {
            Ok(session) => Arc::from(session),
            Err(e) => {
                tracing::warn!(%address, error = %e, "Failed to open session");
                // The stale session, if any, is already closed.
                entries.shift_remove(address);
                return Err(e.into());
            }
        };

        tracing::debug!(%address, generation, "Created new session");
        if let Some(entry) = entries.get_mut(address) {
            *entry = SessionEntry::new(session, generation);
        } else {
            entries.insert(address.clone(), SessionEntry::new(session, generation));
        }

        Ok(ConnectOutcome::Created)
    }

    /// Requests disconnection of one device.
    ///
    /// The entry stays registered for a later reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if no session is registered.
    pub fn disconnect(&self, address: &DeviceAddress) -> Result<()> {
        let session = self.session(address)?;
        tracing::debug!(%address, "Requesting disconnect");
        session.disconnect();
        Ok(())
    }

    /// Requests disconnection of every registered session.
    ///
    /// Entries stay registered. Returns the number of disconnect requests
    /// issued, zero (with a warning) if there was nothing to disconnect.
    pub fn disconnect_all(&self) -> usize {
        if !self.transport.is_initialized() {
            tracing::warn!("Transport not initialized, nothing to disconnect");
            return 0;
        }

        let entries = self.entries.read();
        if entries.is_empty() {
            tracing::warn!("No sessions registered, nothing to disconnect");
            return 0;
        }

        for (address, entry) in entries.iter() {
            tracing::debug!(%address, "Requesting disconnect");
            entry.session.disconnect();
        }
        entries.len()
    }

    /// Closes one session and forgets the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if no session is registered.
    pub fn close(&self, address: &DeviceAddress) -> Result<()> {
        let mut entries = self.entries.write();
        let Some(entry) = entries.shift_remove(address) else {
            tracing::warn!(%address, "No session to close");
            return Err(Error::NotConnected(address.clone()));
        };
        entry.session.close();
        tracing::debug!(%address, "Session closed");
        Ok(())
    }

    /// Closes every session and clears the known-device list.
    ///
    /// Idempotent: returns the number of sessions closed, zero if the
    /// registry was already empty.
    pub fn close_all(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        for (address, entry) in entries.drain(..) {
            entry.session.close();
            tracing::debug!(%address, "Session closed");
        }
        count
    }

    /// Returns the devices that have a session, in first-connect order.
    #[must_use]
    pub fn known_devices(&self) -> Vec<DeviceAddress> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns `true` if a session is registered for `address`.
    #[must_use]
    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.entries.read().contains_key(address)
    }

    /// Returns the number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns `true` if `address` is registered under a newer session than `generation`.
    ///
    /// Events from a replaced session are stale. Addresses without an
    /// entry are never reported stale.
    #[must_use]
    pub fn is_stale(&self, address: &DeviceAddress, generation: u64) -> bool {
        self.entries
            .read()
            .get(address)
            .is_some_and(|entry| entry.generation != generation)
    }

    /// Returns the session registered for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if no session is registered.
    pub fn session(&self, address: &DeviceAddress) -> Result<Arc<dyn TransportSession>> {
        self.entries
            .read()
            .get(address)
            .map(|entry| Arc::clone(&entry.session))
            .ok_or_else(|| Error::NotConnected(address.clone()))
    }

    /// Records whether notification delivery is enabled locally for a characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if no session is registered.
    pub fn set_notifying(
        &self,
        address: &DeviceAddress,
        characteristic: Uuid,
        enabled: bool,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(address)
            .ok_or_else(|| Error::NotConnected(address.clone()))?;

        if enabled {
            entry.notifying.insert(characteristic);
        } else {
            entry.notifying.remove(&characteristic);
        }
        Ok(())
    }

    /// Returns `true` if notification delivery is enabled locally for a characteristic.
    #[must_use]
    pub fn is_notifying(&self, address: &DeviceAddress, characteristic: Uuid) -> bool {
        self.entries
            .read()
            .get(address)
            .is_some_and(|entry| entry.notifying.contains(&characteristic))
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("known_devices", &self.known_devices())
            .finish_non_exhaustive()
    }
}
