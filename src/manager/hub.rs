// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command façade over the session registry.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::dispatch::{DeviceDiagnostics, Diagnostics, EventDispatcher};
use crate::error::{Error, GattError, Result, TransportError};
use crate::event::{DeviceAddress, DeviceEvent, EventBus};
use crate::gatt::{
    CLIENT_CHARACTERISTIC_CONFIG, Characteristic, DISABLE_NOTIFICATION_VALUE, Descriptor,
    ENABLE_NOTIFICATION_VALUE, Service,
};
use crate::session::{ConnectOutcome, SessionRegistry};
use crate::transport::{TaggedEvent, Transport, TransportSession};

use super::HubConfig;

/// Entry point for talking to many BLE peripherals at once.
///
/// The hub owns the [`SessionRegistry`], the single callback channel every
/// session reports through, and the [`EventDispatcher`] task that drains
/// it. Commands never wait for the device: success means the operation was
/// initiated, and its outcome arrives later on the event stream returned
/// by [`subscribe`](Self::subscribe).
///
/// Cloning is cheap; clones share the same sessions and event stream. The
/// dispatcher task stops when the last clone is dropped.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gattmux::event::{DeviceAddress, EventKind};
/// use gattmux::manager::SensorHub;
/// use gattmux::transport::fake::FakeTransport;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gattmux::Result<()> {
/// let transport = FakeTransport::new().with_auto_respond();
/// let hub = SensorHub::new(Arc::new(transport));
/// hub.initialize()?;
///
/// let mut events = hub.subscribe();
/// hub.connect(&DeviceAddress::new("AA:BB"))?;
///
/// let event = events.recv().await.unwrap();
/// assert_eq!(event.kind(), EventKind::Connected);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SensorHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    registry: Arc<SessionRegistry>,
    bus: EventBus,
    diagnostics: Arc<Diagnostics>,
    config: HubConfig,
    /// Callback receiver waiting for the dispatcher to start.
    pending: Mutex<Option<mpsc::UnboundedReceiver<TaggedEvent>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for HubInner {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.get_mut().take() {
            handle.abort();
        }
    }
}

impl SensorHub {
    /// Creates a hub with the default configuration.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::build(transport, HubConfig::default())
    }

    /// Creates a hub with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(transport: Arc<dyn Transport>, config: HubConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(transport, config))
    }

    fn build(transport: Arc<dyn Transport>, config: HubConfig) -> Self {
        let (callbacks, pending) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(HubInner {
                registry: Arc::new(SessionRegistry::new(transport, callbacks)),
                bus: EventBus::with_capacity(config.event_capacity),
                diagnostics: Arc::new(Diagnostics::new()),
                config,
                pending: Mutex::new(Some(pending)),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Checks the transport stack and starts the dispatcher.
    ///
    /// Must be called from within a tokio runtime. Calling it again is
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the stack is unavailable.
    pub fn initialize(&self) -> Result<()> {
        if !self.inner.registry.is_initialized() {
            tracing::error!("Transport stack unavailable");
            return Err(Error::NotInitialized);
        }
        self.start_dispatcher();
        Ok(())
    }

    /// Returns `true` if the transport stack is available.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.registry.is_initialized()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Starts the dispatcher task if a runtime is available and it is not
    /// running yet. Callbacks raised before that stay queued.
    fn start_dispatcher(&self) {
        let mut slot = self.inner.dispatcher.lock();
        if slot.is_some() || tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        let Some(receiver) = self.inner.pending.lock().take() else {
            return;
        };

        let dispatcher = EventDispatcher::new(
            &self.inner.registry,
            self.inner.bus.clone(),
            Arc::clone(&self.inner.diagnostics),
        );
        *slot = Some(dispatcher.spawn(receiver));
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to normalized events of every device.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.bus.subscribe()
    }

    /// Returns the number of active event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.subscriber_count()
    }

    /// Returns what the dispatcher recorded for a device.
    #[must_use]
    pub fn diagnostics(&self, address: &DeviceAddress) -> Option<DeviceDiagnostics> {
        self.inner.diagnostics.get(address)
    }

    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Starts connecting to a device, resuming its session if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt cannot even be initiated.
    pub fn connect(&self, address: &DeviceAddress) -> Result<ConnectOutcome> {
        self.start_dispatcher();
        self.inner.registry.connect(address)
    }

    /// Starts connecting to every address and returns those initiated.
    ///
    /// Failures are logged and skipped.
    pub fn connect_all<I>(&self, addresses: I) -> Vec<DeviceAddress>
    where
        I: IntoIterator<Item = DeviceAddress>,
    {
        addresses
            .into_iter()
            .filter(|address| match self.connect(address) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(%address, error = %e, "Connect not initiated");
                    false
                }
            })
            .collect()
    }

    /// Requests disconnection of one device. Its session is kept for a later connect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the device has no session.
    pub fn disconnect(&self, address: &DeviceAddress) -> Result<()> {
        self.inner
            .registry
            .disconnect(address)
            .inspect_err(|e| tracing::warn!(%address, error = %e, "Cannot disconnect"))
    }

    /// Requests disconnection of every device. Returns the number of requests issued.
    pub fn disconnect_all(&self) -> usize {
        self.inner.registry.disconnect_all()
    }

    /// Closes one device's session and forgets the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the device has no session.
    pub fn close(&self, address: &DeviceAddress) -> Result<()> {
        self.inner.registry.close(address)?;
        self.inner.diagnostics.remove(address);
        Ok(())
    }

    /// Closes every session and clears the known-device list.
    ///
    /// Idempotent. Returns the number of sessions closed.
    pub fn close_all(&self) -> usize {
        let closed = self.inner.registry.close_all();
        self.inner.diagnostics.clear();
        closed
    }

    /// Returns the devices with a session, in first-connect order.
    #[must_use]
    pub fn known_devices(&self) -> Vec<DeviceAddress> {
        self.inner.registry.known_devices()
    }

    // =========================================================================
    // GATT Operations
    // =========================================================================

    fn session(
        &self,
        address: &DeviceAddress,
        operation: &'static str,
    ) -> Result<Arc<dyn TransportSession>> {
        self.inner.registry.session(address).inspect_err(|_| {
            tracing::warn!(%address, operation, "Device not connected, operation skipped");
        })
    }

    fn initiated(address: &DeviceAddress, operation: &'static str, accepted: bool) -> Result<()> {
        if accepted {
            tracing::debug!(%address, operation, "Operation initiated");
            Ok(())
        } else {
            tracing::warn!(%address, operation, "Transport rejected operation");
            Err(TransportError::Rejected { operation }.into())
        }
    }

    /// Starts reading a characteristic. The value arrives as `DataRead`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no session or the transport
    /// refuses the read.
    pub fn read_characteristic(
        &self,
        address: &DeviceAddress,
        characteristic: &Characteristic,
    ) -> Result<()> {
        const OP: &str = "read_characteristic";
        let session = self.session(address, OP)?;
        Self::initiated(address, OP, session.read_characteristic(characteristic))
    }

    /// Starts writing the characteristic's local value. The acknowledgment
    /// arrives as `DataWritten`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no session or the transport
    /// refuses the write.
    pub fn write_characteristic(
        &self,
        address: &DeviceAddress,
        characteristic: &Characteristic,
    ) -> Result<()> {
        const OP: &str = "write_characteristic";
        let session = self.session(address, OP)?;
        Self::initiated(address, OP, session.write_characteristic(characteristic))
    }

    /// Enables or disables notification delivery locally.
    ///
    /// This does not make the device push anything; see
    /// [`write_notify_descriptor`](Self::write_notify_descriptor).
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no session or the transport
    /// refuses the change.
    pub fn enable_notification(
        &self,
        address: &DeviceAddress,
        characteristic: &Characteristic,
        enabled: bool,
    ) -> Result<()> {
        const OP: &str = "set_characteristic_notification";
        let session = self.session(address, OP)?;
        Self::initiated(
            address,
            OP,
            session.set_characteristic_notification(characteristic, enabled),
        )?;
        self.inner
            .registry
            .set_notifying(address, characteristic.uuid(), enabled)
    }

    /// Writes the characteristic's configuration descriptor, which makes
    /// the device start (`enabled`) or stop pushing notifications.
    ///
    /// The descriptor is looked up among the device's discovered services,
    /// so this fails until discovery has completed. Enabling requires
    /// notifications to be enabled locally first.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has no session, if enabling before
    /// notifications were enabled locally, if the descriptor cannot be
    /// found, or if the transport refuses the write.
    pub fn write_notify_descriptor(
        &self,
        address: &DeviceAddress,
        characteristic: &Characteristic,
        enabled: bool,
    ) -> Result<()> {
        const OP: &str = "write_descriptor";
        let session = self.session(address, OP)?;
        let uuid = characteristic.uuid();

        if enabled && !self.inner.registry.is_notifying(address, uuid) {
            tracing::warn!(%address, characteristic = %uuid, "Notifications not enabled locally");
            return Err(GattError::NotificationsDisabled(uuid).into());
        }

        let mut descriptor = Self::notify_descriptor(&session.services(), characteristic)
            .inspect_err(|e| {
                tracing::warn!(
                    %address,
                    characteristic = %uuid,
                    error = %e,
                    "Cannot write notify descriptor"
                );
            })?;
        descriptor.set_value(if enabled {
            ENABLE_NOTIFICATION_VALUE
        } else {
            DISABLE_NOTIFICATION_VALUE
        });

        Self::initiated(address, OP, session.write_descriptor(&descriptor))
    }

    fn notify_descriptor(
        services: &[Service],
        characteristic: &Characteristic,
    ) -> Result<Descriptor> {
        if services.is_empty() {
            return Err(GattError::ServicesNotDiscovered.into());
        }

        let uuid = characteristic.uuid();
        let discovered = services
            .iter()
            .filter(|s| s.uuid() == characteristic.service())
            .chain(services.iter())
            .find_map(|s| s.characteristic(uuid))
            .ok_or(GattError::CharacteristicNotFound(uuid))?;

        discovered
            .descriptor(CLIENT_CHARACTERISTIC_CONFIG)
            .cloned()
            .ok_or_else(|| {
                GattError::DescriptorNotFound {
                    characteristic: uuid,
                    descriptor: CLIENT_CHARACTERISTIC_CONFIG,
                }
                .into()
            })
    }

    /// Returns the services discovered on a device.
    ///
    /// Empty until discovery has completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the device has no session.
    pub fn list_services(&self, address: &DeviceAddress) -> Result<Vec<Service>> {
        Ok(self.session(address, "list_services")?.services())
    }

    /// Returns one discovered service of a device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the device has no session.
    pub fn get_service(&self, address: &DeviceAddress, uuid: Uuid) -> Result<Option<Service>> {
        Ok(self.session(address, "get_service")?.service(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::{FakeOperation, FakeTransport};

    const SERVICE: Uuid = Uuid::from_u128(0xf000_aa70_0451_4000_b000_0000_0000_0000);
    const DATA: Uuid = Uuid::from_u128(0xf000_aa71_0451_4000_b000_0000_0000_0000);
    const PLAIN: Uuid = Uuid::from_u128(0xf000_aa72_0451_4000_b000_0000_0000_0000);

    fn peripheral() -> Vec<Service> {
        vec![Service::new(SERVICE)
            .with_characteristic(Characteristic::new(SERVICE, DATA).with_notify_descriptor())
            .with_characteristic(Characteristic::new(SERVICE, PLAIN))]
    }

    fn hub(fake: &FakeTransport) -> SensorHub {
        SensorHub::new(Arc::new(fake.clone()))
    }

    fn addr(s: &str) -> DeviceAddress {
        DeviceAddress::new(s)
    }

    #[test]
    fn per_device_operations_require_a_session() {
        let fake = FakeTransport::new();
        let hub = hub(&fake);
        let characteristic = Characteristic::new(SERVICE, DATA);
        let unknown = addr("AA");

        let not_connected =
            |r: Result<()>| matches!(r, Err(Error::NotConnected(a)) if a == unknown);

        assert!(not_connected(hub.read_characteristic(&unknown, &characteristic)));
        assert!(not_connected(hub.write_characteristic(&unknown, &characteristic)));
        assert!(not_connected(hub.enable_notification(&unknown, &characteristic, true)));
        assert!(not_connected(
            hub.write_notify_descriptor(&unknown, &characteristic, true)
        ));
        assert!(not_connected(hub.disconnect(&unknown)));
        assert!(matches!(hub.list_services(&unknown), Err(Error::NotConnected(_))));
        assert!(matches!(hub.get_service(&unknown, SERVICE), Err(Error::NotConnected(_))));

        assert!(fake.operations(&unknown).is_empty());
    }

    #[test]
    fn initialize_fails_without_stack() {
        let hub = hub(&FakeTransport::uninitialized());
        assert!(!hub.is_initialized());
        assert!(matches!(hub.initialize(), Err(Error::NotInitialized)));
    }

    #[test]
    fn with_config_validates() {
        let config = HubConfig::new().with_event_capacity(0);
        assert!(matches!(
            SensorHub::with_config(Arc::new(FakeTransport::new()), config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn connect_all_skips_failures() {
        let fake = FakeTransport::new();
        let hub = hub(&fake);

        let initiated = hub.connect_all([addr("AA"), addr(""), addr("BB")]);

        assert_eq!(initiated, vec![addr("AA"), addr("BB")]);
        assert_eq!(hub.known_devices(), vec![addr("AA"), addr("BB")]);
    }

    #[test]
    fn notify_descriptor_requires_local_enable() {
        let fake = FakeTransport::new();
        fake.add_peripheral("AA", peripheral());
        let hub = hub(&fake);
        hub.connect(&addr("AA")).unwrap();
        fake.complete_discovery(&addr("AA"));

        let characteristic = Characteristic::new(SERVICE, DATA);
        assert!(matches!(
            hub.write_notify_descriptor(&addr("AA"), &characteristic, true),
            Err(Error::Gatt(GattError::NotificationsDisabled(u))) if u == DATA
        ));
    }

    #[test]
    fn notify_descriptor_fails_before_discovery() {
        let fake = FakeTransport::new();
        fake.add_peripheral("AA", peripheral());
        let hub = hub(&fake);
        hub.connect(&addr("AA")).unwrap();
        let characteristic = Characteristic::new(SERVICE, DATA);
        hub.enable_notification(&addr("AA"), &characteristic, true).unwrap();

        let result = hub.write_notify_descriptor(&addr("AA"), &characteristic, true);

        assert!(matches!(
            result,
            Err(Error::Gatt(GattError::ServicesNotDiscovered))
        ));
        assert!(!fake
            .operations(&addr("AA"))
            .iter()
            .any(|op| matches!(op, FakeOperation::WriteDescriptor { .. })));
    }

    #[test]
    fn notify_descriptor_writes_enable_value() {
        let fake = FakeTransport::new();
        fake.add_peripheral("AA", peripheral());
        let hub = hub(&fake);
        hub.connect(&addr("AA")).unwrap();
        fake.complete_discovery(&addr("AA"));
        let characteristic = Characteristic::new(SERVICE, DATA);

        hub.enable_notification(&addr("AA"), &characteristic, true).unwrap();
        hub.write_notify_descriptor(&addr("AA"), &characteristic, true).unwrap();

        let ops = fake.operations(&addr("AA"));
        assert!(ops.contains(&FakeOperation::SetNotification(DATA, true)));
        assert!(ops.contains(&FakeOperation::WriteDescriptor {
            characteristic: DATA,
            descriptor: CLIENT_CHARACTERISTIC_CONFIG,
            value: ENABLE_NOTIFICATION_VALUE.to_vec(),
        }));
    }

    #[test]
    fn notify_descriptor_writes_disable_value() {
        let fake = FakeTransport::new();
        fake.add_peripheral("AA", peripheral());
        let hub = hub(&fake);
        hub.connect(&addr("AA")).unwrap();
        fake.complete_discovery(&addr("AA"));
        let characteristic = Characteristic::new(SERVICE, DATA);
        hub.enable_notification(&addr("AA"), &characteristic, true).unwrap();
        hub.write_notify_descriptor(&addr("AA"), &characteristic, true).unwrap();

        hub.enable_notification(&addr("AA"), &characteristic, false).unwrap();
        hub.write_notify_descriptor(&addr("AA"), &characteristic, false).unwrap();

        let writes: Vec<_> = fake
            .operations(&addr("AA"))
            .into_iter()
            .filter_map(|op| match op {
                FakeOperation::WriteDescriptor { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            vec![ENABLE_NOTIFICATION_VALUE.to_vec(), DISABLE_NOTIFICATION_VALUE.to_vec()]
        );
    }

    #[test]
    fn notify_descriptor_requires_cccd() {
        let fake = FakeTransport::new();
        fake.add_peripheral("AA", peripheral());
        let hub = hub(&fake);
        hub.connect(&addr("AA")).unwrap();
        fake.complete_discovery(&addr("AA"));
        let plain = Characteristic::new(SERVICE, PLAIN);
        let missing = Characteristic::new(SERVICE, Uuid::from_u128(9));
        hub.enable_notification(&addr("AA"), &plain, true).unwrap();
        hub.enable_notification(&addr("AA"), &missing, true).unwrap();

        assert!(matches!(
            hub.write_notify_descriptor(&addr("AA"), &plain, true),
            Err(Error::Gatt(GattError::DescriptorNotFound { .. }))
        ));
        assert!(matches!(
            hub.write_notify_descriptor(&addr("AA"), &missing, true),
            Err(Error::Gatt(GattError::CharacteristicNotFound(_)))
        ));
    }

    #[test]
    fn services_are_listed_after_discovery() {
        let fake = FakeTransport::new();
        fake.add_peripheral("AA", peripheral());
        let hub = hub(&fake);
        hub.connect(&addr("AA")).unwrap();

        assert!(hub.list_services(&addr("AA")).unwrap().is_empty());
        fake.complete_discovery(&addr("AA"));

        assert_eq!(hub.list_services(&addr("AA")).unwrap().len(), 1);
        assert!(hub.get_service(&addr("AA"), SERVICE).unwrap().is_some());
        assert!(hub.get_service(&addr("AA"), Uuid::nil()).unwrap().is_none());
    }

    #[test]
    fn close_all_clears_known_devices() {
        let fake = FakeTransport::new();
        let hub = hub(&fake);
        hub.connect(&addr("AA")).unwrap();
        hub.connect(&addr("BB")).unwrap();

        assert_eq!(hub.close_all(), 2);
        assert!(hub.known_devices().is_empty());
        assert_eq!(hub.close_all(), 0);
    }
}
