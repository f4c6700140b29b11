//! Multi-sensor tests of the polling engine over the mock transport.
//!
//! Run with: `cargo test --package flora-core --test engine`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flora_core::{
    AlertStatus, BatteryStatus, FirmwareInfo, FloraTransport, MockDevice, MockTransport,
    PollOutcome, RadioArbiter, RawReading, SensorConfig, SensorPoller, SensorStatus,
    SensorValues, SnapshotEngine, Thresholds,
};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn address(index: u8) -> String {
    format!("c4:7c:8d:6a:00:{:02x}", index)
}

/// A transport with `count` sensors in range, each discovery taking `latency`.
fn radio(count: u8, latency: Duration) -> (Arc<MockTransport>, Vec<Arc<MockDevice>>) {
    let transport = Arc::new(MockTransport::new());
    transport.set_discover_latency(latency);
    let devices = (0..count)
        .map(|i| {
            transport.add_device(
                MockDevice::builder()
                    .address(&address(i))
                    .moisture(10 + i)
                    .build(),
            )
        })
        .collect();
    (transport, devices)
}

fn pollers(
    count: u8,
    arbiter: &RadioArbiter,
    transport: &Arc<MockTransport>,
) -> Vec<Arc<SensorPoller>> {
    (0..count)
        .map(|i| {
            let config = SensorConfig::new(address(i))
                .name(format!("Plant {i}"))
                .poll_interval(Duration::from_secs(60));
            Arc::new(SensorPoller::new(
                config,
                arbiter.clone(),
                Arc::clone(transport) as Arc<dyn FloraTransport>,
            ))
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_discoveries_never_overlap() {
    let (transport, _devices) = radio(4, Duration::from_secs(5));
    let arbiter = RadioArbiter::default();
    let pollers = pollers(4, &arbiter, &transport);

    let handles: Vec<_> = pollers
        .iter()
        .map(|poller| {
            let poller = Arc::clone(poller);
            tokio::spawn(async move { poller.poll_once().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), PollOutcome::Updated);
    }

    assert_eq!(transport.discover_count(), 4);
    assert_eq!(transport.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_running_pollers_never_overlap() {
    let (transport, devices) = radio(3, Duration::from_secs(2));
    // Every other discovery misses, so the pollers keep contending.
    transport.set_missed_discoveries(2);
    let arbiter = RadioArbiter::default();
    let pollers = pollers(3, &arbiter, &transport);
    let cancel = CancellationToken::new();

    let handles: Vec<_> = pollers
        .iter()
        .map(|poller| poller.spawn(cancel.clone()))
        .collect();

    tokio::time::sleep(Duration::from_secs(600)).await;
    cancel.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(transport.max_in_flight(), 1);
    for device in &devices {
        assert!(device.query_count() > 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_turns_granted_in_arrival_order() {
    let (transport, _devices) = radio(3, Duration::from_secs(1));
    let arbiter = RadioArbiter::new(Duration::from_secs(15));
    let pollers = pollers(3, &arbiter, &transport);
    let finished = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for (i, poller) in pollers.iter().enumerate() {
        let poller = Arc::clone(poller);
        let finished = Arc::clone(&finished);
        handles.push(tokio::spawn(async move {
            poller.poll_once().await;
            finished.lock().unwrap().push(i);
        }));
        // Let this poller queue up before the next one arrives.
        tokio::task::yield_now().await;
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*finished.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_skipped_cycle_leaves_snapshot_untouched() {
    let (transport, _devices) = radio(1, Duration::ZERO);
    transport.set_missed_discoveries(3);
    let arbiter = RadioArbiter::default();
    let poller = &pollers(1, &arbiter, &transport)[0];
    let before = poller.status().snapshot();

    assert_eq!(poller.poll_once().await, PollOutcome::Skipped);

    assert_eq!(transport.discover_count(), 3);
    assert_eq!(*poller.status().snapshot(), *before);
    assert!(!poller.status().active());
}

#[tokio::test(start_paused = true)]
async fn test_query_failure_keeps_previous_values() {
    let (transport, devices) = radio(1, Duration::ZERO);
    let arbiter = RadioArbiter::default();
    let poller = &pollers(1, &arbiter, &transport)[0];

    assert_eq!(poller.poll_once().await, PollOutcome::Updated);
    let status = poller.status();
    let before = status.report();

    devices[0].set_moisture(99).await;
    devices[0].set_should_fail(true, Some("GATT read failed")).await;
    assert_eq!(poller.poll_once().await, PollOutcome::QueryFailed);

    assert_eq!(status.report(), before);
    assert_eq!(status.moisture(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_query_runs_outside_radio_turn() {
    let (transport, devices) = radio(1, Duration::ZERO);
    let arbiter = RadioArbiter::new(Duration::from_secs(15));
    let poller = Arc::clone(&pollers(1, &arbiter, &transport)[0]);

    poller.poll_once().await;
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!arbiter.is_busy());

    devices[0].set_query_latency(Duration::from_secs(30));
    let cycle = tokio::spawn({
        let poller = Arc::clone(&poller);
        async move { poller.poll_once().await }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!arbiter.is_busy());

    assert_eq!(cycle.await.unwrap(), PollOutcome::Updated);
}

#[tokio::test(start_paused = true)]
async fn test_alerts_follow_readings() {
    let transport = Arc::new(MockTransport::new());
    let device = transport.add_device(
        MockDevice::builder()
            .address("c4:7c:8d:6a:12:34")
            .moisture(8)
            .light(20)
            .battery(9)
            .build(),
    );
    let config = SensorConfig::new("c4:7c:8d:6a:12:34")
        .humidity_alert_level(15)
        .low_light_alert_level(100);
    let poller = SensorPoller::new(config, RadioArbiter::default(), transport);
    let status = poller.status();

    // Enabled alerts read as triggered before any reading.
    assert_eq!(status.humidity_alert_status(), Some(AlertStatus::Triggered));
    assert_eq!(status.low_battery_status(), BatteryStatus::Normal);

    poller.poll_once().await;
    assert_eq!(status.humidity_alert_status(), Some(AlertStatus::Triggered));
    assert_eq!(status.low_light_alert_status(), Some(AlertStatus::Triggered));
    assert_eq!(status.low_battery_status(), BatteryStatus::Low);
    assert_eq!(status.critical_battery_status(), BatteryStatus::Low);

    device.set_moisture(40).await;
    device.set_light(5000).await;
    device.set_battery(60).await;
    poller.poll_once().await;
    assert_eq!(status.humidity_alert_status(), Some(AlertStatus::Normal));
    assert_eq!(status.low_light_alert_status(), Some(AlertStatus::Normal));
    assert_eq!(status.low_battery_status(), BatteryStatus::Normal);
    assert_eq!(status.critical_battery_status(), BatteryStatus::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_cache_reused_across_cycles() {
    let (transport, devices) = radio(2, Duration::from_secs(1));
    let arbiter = RadioArbiter::default();
    let pollers = pollers(2, &arbiter, &transport);

    for _ in 0..5 {
        for poller in &pollers {
            assert_eq!(poller.poll_once().await, PollOutcome::Updated);
        }
    }

    assert_eq!(transport.discover_count(), 2);
    for device in &devices {
        assert_eq!(device.query_count(), 5);
    }
}

proptest! {
    #[test]
    fn test_reading_round_trips_through_status(
        temperature in -400i16..=600,
        light in any::<u32>(),
        moisture in 0u8..=100,
        fertility in any::<u16>(),
        battery in 0u8..=100,
        humidity_level in proptest::option::of(0u8..=100),
    ) {
        let mut config = SensorConfig::new("c4:7c:8d:6a:12:34");
        if let Some(level) = humidity_level {
            config = config.humidity_alert_level(level);
        }
        let engine = SnapshotEngine::new(Thresholds::new(config.thresholds.clone()));
        let status = SensorStatus::new(&config, engine.subscribe());

        let temperature = f32::from(temperature) / 10.0;
        engine.update(RawReading {
            sensor: SensorValues { temperature, light, moisture, fertility },
            firmware: FirmwareInfo { version: "3.3.1".to_string(), battery },
        });

        prop_assert_eq!(status.temperature(), temperature);
        prop_assert_eq!(status.light_level(), light);
        prop_assert_eq!(status.moisture(), moisture);
        prop_assert_eq!(status.fertility(), fertility);
        prop_assert_eq!(status.battery_level(), battery);
        prop_assert_eq!(status.firmware_version(), "3.3.1");
        prop_assert!(status.active());

        let expected_low = if battery <= 10 { BatteryStatus::Low } else { BatteryStatus::Normal };
        prop_assert_eq!(status.low_battery_status(), expected_low);
        let expected_humidity = humidity_level.map(|level| {
            if moisture <= level { AlertStatus::Triggered } else { AlertStatus::Normal }
        });
        prop_assert_eq!(status.humidity_alert_status(), expected_humidity);
    }
}
