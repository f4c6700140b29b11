//! Latest-value snapshot and alert derivation.
//!
//! [`SnapshotEngine`] is the single writer of a sensor's [`Snapshot`]. Each
//! successful reading replaces the whole snapshot, alerts included, and the
//! new value is published through a `tokio::sync::watch` channel. Readers get
//! an `Arc<Snapshot>` and never see a partially updated record.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::info;

use flora_types::{AlertStatus, BatteryStatus, FirmwareInfo, RawReading, SensorValues};

use crate::thresholds::Thresholds;

/// Alerts derived from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertState {
    /// Battery at or below the configured low-battery level.
    pub low_battery: BatteryStatus,
    /// Battery at or below the fixed critical level.
    pub critical_battery: BatteryStatus,
    /// Moisture at or below the humidity alert level (`None` when disabled).
    pub humidity: Option<AlertStatus>,
    /// Light at or below the low-light alert level (`None` when disabled).
    pub low_light: Option<AlertStatus>,
    /// Whether any reading has ever been recorded.
    pub active: bool,
}

/// Latest known state of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Last sensor values, absent until the first successful poll.
    pub sensor: Option<SensorValues>,
    /// Last battery/firmware info, absent until the first successful poll.
    pub firmware: Option<FirmwareInfo>,
    pub alerts: AlertState,
    /// When the snapshot was last updated from a reading.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Snapshot {
    /// Snapshot before any reading, with alert defaults applied.
    pub fn initial(thresholds: &Thresholds) -> Self {
        Self {
            sensor: None,
            firmware: None,
            alerts: thresholds.evaluate(None, None),
            updated_at: None,
        }
    }
}

/// Single writer of a sensor snapshot.
#[derive(Debug)]
pub struct SnapshotEngine {
    thresholds: Thresholds,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::initial(&thresholds)));
        Self { thresholds, tx }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Receiver that always holds the latest published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// The snapshot currently published.
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.tx.borrow())
    }

    /// Replace the snapshot with `reading` and recompute every alert.
    ///
    /// Values are stored verbatim; no rounding or unit conversion happens.
    pub fn update(&self, reading: RawReading) -> Arc<Snapshot> {
        let RawReading { sensor, firmware } = reading;

        info!(
            "Lux: {}, Temperature: {}, Moisture: {}, Fertility: {}",
            sensor.light, sensor.temperature, sensor.moisture, sensor.fertility
        );
        info!(
            "Firmware: {}, Battery level: {}",
            firmware.version, firmware.battery
        );

        let alerts = self.thresholds.evaluate(Some(&sensor), Some(&firmware));
        let snapshot = Arc::new(Snapshot {
            sensor: Some(sensor),
            firmware: Some(firmware),
            alerts,
            updated_at: Some(OffsetDateTime::now_utc()),
        });

        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::ThresholdConfig;

    fn reading(moisture: u8, light: u32, battery: u8) -> RawReading {
        RawReading {
            sensor: SensorValues {
                temperature: 21.8,
                light,
                moisture,
                fertility: 273,
            },
            firmware: FirmwareInfo {
                version: "3.3.1".to_string(),
                battery,
            },
        }
    }

    fn engine() -> SnapshotEngine {
        SnapshotEngine::new(Thresholds::new(ThresholdConfig {
            humidity_alert_level: Some(10),
            low_light_alert_level: Some(100),
            low_battery_level: 10,
        }))
    }

    #[test]
    fn test_initial_snapshot() {
        let engine = engine();
        let snapshot = engine.current();

        assert!(snapshot.sensor.is_none());
        assert!(snapshot.firmware.is_none());
        assert!(snapshot.updated_at.is_none());
        assert!(!snapshot.alerts.active);
        assert_eq!(snapshot.alerts.humidity, Some(AlertStatus::Triggered));
        assert_eq!(snapshot.alerts.low_light, Some(AlertStatus::Triggered));
    }

    #[test]
    fn test_update_stores_values_verbatim() {
        let engine = SnapshotEngine::new(Thresholds::default());

        let snapshot = engine.update(RawReading {
            sensor: SensorValues {
                temperature: 21.8,
                light: 0,
                moisture: 41,
                fertility: 273,
            },
            firmware: FirmwareInfo {
                version: "3.3.1".to_string(),
                battery: 38,
            },
        });

        let sensor = snapshot.sensor.unwrap();
        assert_eq!(sensor.temperature, 21.8);
        assert_eq!(sensor.light, 0);
        assert_eq!(sensor.moisture, 41);
        assert_eq!(sensor.fertility, 273);
        let firmware = snapshot.firmware.as_ref().unwrap();
        assert_eq!(firmware.version, "3.3.1");
        assert_eq!(firmware.battery, 38);
        assert!(snapshot.alerts.active);
        assert!(snapshot.updated_at.is_some());
    }

    #[test]
    fn test_update_derives_alerts() {
        let engine = engine();

        let low = engine.update(reading(5, 50, 8));
        assert_eq!(low.alerts.humidity, Some(AlertStatus::Triggered));
        assert_eq!(low.alerts.low_light, Some(AlertStatus::Triggered));
        assert_eq!(low.alerts.low_battery, BatteryStatus::Low);

        let fine = engine.update(reading(50, 5000, 25));
        assert_eq!(fine.alerts.humidity, Some(AlertStatus::Normal));
        assert_eq!(fine.alerts.low_light, Some(AlertStatus::Normal));
        assert_eq!(fine.alerts.low_battery, BatteryStatus::Normal);
        assert_eq!(fine.alerts.critical_battery, BatteryStatus::Normal);
    }

    #[test]
    fn test_active_stays_true() {
        let engine = engine();
        engine.update(reading(50, 5000, 80));
        let snapshot = engine.update(reading(0, 0, 0));
        assert!(snapshot.alerts.active);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let engine = engine();
        let mut rx = engine.subscribe();
        assert!(rx.borrow().sensor.is_none());

        engine.update(reading(33, 200, 60));

        rx.changed().await.unwrap();
        let snapshot = Arc::clone(&*rx.borrow_and_update());
        assert_eq!(snapshot.sensor.unwrap().moisture, 33);
    }

    #[test]
    fn test_snapshot_serializes() {
        let engine = engine();
        engine.update(reading(33, 200, 60));

        let json = serde_json::to_value(&*engine.current()).unwrap();
        assert_eq!(json["sensor"]["moisture"], 33);
        assert_eq!(json["firmware"]["version"], "3.3.1");
        assert_eq!(json["alerts"]["humidity"], "normal");
        assert!(json["updated_at"].is_string());
    }
}
