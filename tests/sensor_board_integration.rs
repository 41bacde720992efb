// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests: scan, connect, activate sensors and decode readings.

use std::sync::Arc;
use std::time::Duration;

use gattmux::discovery::{Advertisement, DiscoveryOptions, collect_candidates};
use gattmux::transport::fake::{FakeOperation, FakeTransport};
use gattmux::{
    BoardUpdate, Characteristic, DeviceAddress, DeviceEvent, EventKind, GattStatus, SensorBoard,
    SensorHub, Service,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use uuid::Uuid;

const LUX_SERVICE: Uuid = Uuid::from_u128(0xf000_aa70_0451_4000_b000_0000_0000_0000);
const LUX_DATA: Uuid = Uuid::from_u128(0xf000_aa71_0451_4000_b000_0000_0000_0000);
const LUX_CONFIG: Uuid = Uuid::from_u128(0xf000_aa72_0451_4000_b000_0000_0000_0000);
const CCCD: Uuid = Uuid::from_u128(0x0000_2902_0000_1000_8000_0080_5f9b_34fb);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn addr(s: &str) -> DeviceAddress {
    DeviceAddress::new(s)
}

fn sensortag() -> Vec<Service> {
    vec![
        Service::new(Uuid::from_u128(0x180a)),
        Service::new(LUX_SERVICE)
            .with_characteristic(
                Characteristic::new(LUX_SERVICE, LUX_DATA).with_notify_descriptor(),
            )
            .with_characteristic(Characteristic::new(LUX_SERVICE, LUX_CONFIG)),
    ]
}

/// Auto-responding stack with a SensorTag at each address.
fn stack_with(addresses: &[&str]) -> FakeTransport {
    let fake = FakeTransport::new().with_auto_respond();
    for a in addresses {
        fake.add_peripheral(*a, sensortag());
    }
    fake
}

async fn wait_for(
    rx: &mut broadcast::Receiver<DeviceEvent>,
    address: &DeviceAddress,
    kind: EventKind,
) {
    timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event stream open");
            if event.address() == address && event.kind() == kind {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for event");
}

/// Returns the next notification from `address`.
async fn next_notify(
    rx: &mut broadcast::Receiver<DeviceEvent>,
    address: &DeviceAddress,
) -> DeviceEvent {
    timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event stream open");
            if event.address() == address && event.kind() == EventKind::DataNotify {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for notification")
}

/// Connects every address and waits until each has its services.
async fn connect_ready(hub: &SensorHub, addresses: &[DeviceAddress]) {
    let mut observer = hub.subscribe();
    hub.connect_all(addresses.iter().cloned());
    for address in addresses {
        wait_for(&mut observer, address, EventKind::ServicesReady).await;
    }
}

// ============================================================================
// Activation
// ============================================================================

mod activation {
    use super::*;

    #[tokio::test]
    async fn activate_writes_config_then_subscribes() {
        init_tracing();
        let fake = stack_with(&["AA"]);
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();
        let address = addr("AA");
        connect_ready(&hub, std::slice::from_ref(&address)).await;

        let mut board = SensorBoard::new(hub.clone());
        assert_eq!(board.create_sensors(hub.known_devices()), vec![address.clone()]);
        board.activate(&address).unwrap();

        let gatt_ops: Vec<_> = fake
            .operations(&address)
            .into_iter()
            .filter(|op| {
                matches!(
                    op,
                    FakeOperation::Write(..)
                        | FakeOperation::SetNotification(..)
                        | FakeOperation::WriteDescriptor { .. }
                )
            })
            .collect();
        assert_eq!(
            gatt_ops,
            vec![
                FakeOperation::Write(LUX_CONFIG, vec![0x01]),
                FakeOperation::SetNotification(LUX_DATA, true),
                FakeOperation::WriteDescriptor {
                    characteristic: LUX_DATA,
                    descriptor: CCCD,
                    value: vec![0x01, 0x00],
                },
            ]
        );
    }

    #[tokio::test]
    async fn activate_before_discovery_fails_without_writing() {
        init_tracing();
        let fake = FakeTransport::new();
        fake.add_peripheral("AA", sensortag());
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();
        let address = addr("AA");
        hub.connect(&address).unwrap();

        let mut board = SensorBoard::new(hub.clone());
        assert!(!board.create_sensor(&address));
        assert!(board.activate(&address).is_err());

        assert!(
            !fake
                .operations(&address)
                .iter()
                .any(|op| matches!(op, FakeOperation::Write(..)))
        );
    }

    #[tokio::test]
    async fn device_without_sensor_gets_no_decoder() {
        init_tracing();
        let fake = FakeTransport::new().with_auto_respond();
        fake.add_peripheral("AA", vec![Service::new(Uuid::from_u128(0x180f))]);
        let hub = SensorHub::new(Arc::new(fake));
        hub.initialize().unwrap();
        let address = addr("AA");
        connect_ready(&hub, std::slice::from_ref(&address)).await;

        let mut board = SensorBoard::new(hub.clone());

        assert!(board.create_sensors(hub.known_devices()).is_empty());
        assert!(board.activate(&address).is_err());
    }
}

// ============================================================================
// Readings
// ============================================================================

mod readings {
    use super::*;

    #[tokio::test]
    async fn notification_updates_exactly_one_reading() {
        init_tracing();
        let fake = stack_with(&["AA", "BB"]);
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();
        let devices = [addr("AA"), addr("BB")];
        connect_ready(&hub, &devices).await;

        let mut board = SensorBoard::new(hub.clone());
        board.create_sensors(hub.known_devices());
        for address in &devices {
            board.activate(address).unwrap();
        }
        let mut events = hub.subscribe();
        let mut observer = hub.subscribe();

        fake.notify(&addr("BB"), LUX_DATA, [0x64, 0x10]);
        wait_for(&mut observer, &addr("BB"), EventKind::DataNotify).await;
        board.drain(&mut events);

        assert_eq!(board.latest_readings().len(), 1);
        let reading = board.latest(&addr("BB")).unwrap();
        assert_eq!(reading.value, "2.00 lux");
        assert_eq!(reading.notifications, 1);
        assert_eq!(board.render(), "BB: 2.00 lux\n");
    }

    #[tokio::test]
    async fn push_on_another_characteristic_keeps_the_reading() {
        init_tracing();
        let fake = stack_with(&["AA"]);
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();
        let address = addr("AA");
        connect_ready(&hub, std::slice::from_ref(&address)).await;

        let mut board = SensorBoard::new(hub.clone());
        board.create_sensors(hub.known_devices());
        let mut events = hub.subscribe();
        let mut observer = hub.subscribe();

        fake.notify(&address, LUX_DATA, [0x64, 0x10]);
        fake.notify(&address, Uuid::from_u128(0x2a19), [0x55, 0x00]);
        wait_for(&mut observer, &address, EventKind::DataNotify).await;
        wait_for(&mut observer, &address, EventKind::DataNotify).await;
        board.drain(&mut events);

        let reading = board.latest(&address).unwrap();
        assert_eq!(reading.value, "2.00 lux");
        assert_eq!(reading.notifications, 1);
    }

    #[tokio::test]
    async fn run_keeps_the_latest_value_per_device() {
        init_tracing();
        let fake = stack_with(&["AA", "BB"]);
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();
        connect_ready(&hub, &[addr("AA"), addr("BB")]).await;

        let mut board = SensorBoard::new(hub.clone());
        board.create_sensors(hub.known_devices());
        let mut events = hub.subscribe();

        fake.notify(&addr("AA"), LUX_DATA, [0x64, 0x00]);
        fake.notify(&addr("BB"), LUX_DATA, [0xC8, 0x00]);
        fake.notify(&addr("AA"), LUX_DATA, [0x2C, 0x01]);

        // The event stream stays open, so run only stops when cancelled.
        let _ = timeout(Duration::from_millis(200), board.run(&mut events)).await;

        assert_eq!(board.latest(&addr("AA")).unwrap().value, "3.00 lux");
        assert_eq!(board.latest(&addr("AA")).unwrap().notifications, 2);
        assert_eq!(board.latest(&addr("BB")).unwrap().value, "2.00 lux");
        assert_eq!(board.render(), "AA: 3.00 lux\nBB: 2.00 lux\n");
    }

    #[tokio::test]
    async fn rebuilt_board_reconstructs_decoder_on_notify() {
        init_tracing();
        let fake = stack_with(&["AA"]);
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();
        let address = addr("AA");
        connect_ready(&hub, std::slice::from_ref(&address)).await;

        {
            let mut first = SensorBoard::new(hub.clone());
            first.create_sensors(hub.known_devices());
            first.activate(&address).unwrap();
        }

        // A fresh board has no decoders while the session lives on.
        let mut board = SensorBoard::new(hub.clone());
        let mut events = hub.subscribe();
        fake.notify(&address, LUX_DATA, [0x64, 0x00]);
        let event = next_notify(&mut events, &address).await;

        assert_eq!(board.handle_event(&event), BoardUpdate::Reconstructed(address.clone()));
        assert_eq!(board.latest(&address).unwrap().value, "1.00 lux");
        assert_eq!(hub.known_devices(), vec![address.clone()]);
        assert_eq!(fake.sessions_opened(&address), 1);
    }

    #[tokio::test]
    async fn notify_for_closed_device_leaves_board_untouched() {
        init_tracing();
        let fake = stack_with(&["AA"]);
        let hub = SensorHub::new(Arc::new(fake));
        hub.initialize().unwrap();
        let address = addr("AA");
        connect_ready(&hub, std::slice::from_ref(&address)).await;
        hub.close_all();

        let mut board = SensorBoard::new(hub.clone());
        let stale = DeviceEvent::data_notify(address.clone(), LUX_DATA, vec![0x64, 0x00]);

        assert_eq!(board.handle_event(&stale), BoardUpdate::Dropped(address));
        assert!(board.latest_readings().is_empty());
    }

    #[tokio::test]
    async fn disconnect_disables_only_that_sensor() {
        init_tracing();
        let fake = stack_with(&["AA", "BB"]);
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();
        connect_ready(&hub, &[addr("AA"), addr("BB")]).await;

        let mut board = SensorBoard::new(hub.clone());
        board.create_sensors(hub.known_devices());
        let mut events = hub.subscribe();
        let mut observer = hub.subscribe();

        hub.disconnect(&addr("AA")).unwrap();
        wait_for(&mut observer, &addr("AA"), EventKind::Disconnected).await;
        board.drain(&mut events);

        assert!(!board.directory().get(&addr("AA")).unwrap().is_enabled());
        assert!(board.directory().get(&addr("BB")).unwrap().is_enabled());

        // The next sample turns the sensor back on.
        fake.link_up(&addr("AA"));
        fake.notify(&addr("AA"), LUX_DATA, [0x64, 0x00]);
        wait_for(&mut observer, &addr("AA"), EventKind::DataNotify).await;
        board.drain(&mut events);
        assert!(board.directory().get(&addr("AA")).unwrap().is_enabled());
    }
}

// ============================================================================
// Scan To Readings
// ============================================================================

mod scan_flow {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scanned_sensortags_are_connected_and_read() {
        init_tracing();
        let fake = stack_with(&["B0:01", "B0:02"]);
        let hub = SensorHub::new(Arc::new(fake.clone()));
        hub.initialize().unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        tx.send(Advertisement::new("B0:01", Some("SensorTag"), -50)).await.unwrap();
        tx.send(Advertisement::new("C0:99", Some("Headphones"), -40)).await.unwrap();
        tx.send(Advertisement::new("B0:02", Some("CC2650 SensorTag"), -70)).await.unwrap();
        tx.send(Advertisement::new("B0:01", Some("SensorTag"), -48)).await.unwrap();
        tx.send(Advertisement::new("D0:00", None, -30)).await.unwrap();

        let found = collect_candidates(&mut rx, &DiscoveryOptions::default()).await;
        assert_eq!(found.addresses(), vec![addr("B0:01"), addr("B0:02")]);

        connect_ready(&hub, &found.addresses()).await;
        let mut board = SensorBoard::new(hub.clone());
        assert_eq!(board.create_sensors(hub.known_devices()).len(), 2);
        for address in hub.known_devices() {
            board.activate(&address).unwrap();
        }

        let mut events = hub.subscribe();
        fake.notify(&addr("B0:02"), LUX_DATA, [0x64, 0x10]);
        let event = next_notify(&mut events, &addr("B0:02")).await;
        board.handle_event(&event);

        assert_eq!(board.render(), "B0:02: 2.00 lux\n");
        assert_eq!(
            hub.diagnostics(&addr("B0:02")).unwrap().last_descriptor_status,
            Some(GattStatus::SUCCESS)
        );
    }
}
