//! Read-only status accessors for a home-automation host.
//!
//! [`SensorStatus`] reads the snapshot most recently published by the
//! sensor's poller. Accessors never wait on radio I/O and return a fixed
//! default until the first reading arrives.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;

use flora_types::{AlertStatus, BatteryStatus, ChargingState};

use crate::config::SensorConfig;
use crate::snapshot::Snapshot;

/// Firmware version reported before the first reading.
pub const DEFAULT_FIRMWARE_VERSION: &str = "0.0.0";

/// Static identity of a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorInfo {
    pub name: String,
    pub address: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
}

impl SensorInfo {
    pub fn from_config(config: &SensorConfig) -> Self {
        Self {
            name: config.name.clone(),
            address: config.address.clone(),
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
            serial: config.serial.clone().unwrap_or_else(|| config.name.clone()),
        }
    }
}

/// A group of related values a host can expose for a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposedService {
    Information,
    Temperature,
    Light,
    Battery,
    /// Soil moisture and fertility.
    PlantSensor,
    HumidityAlert,
    LowLightAlert,
}

/// Cheap, cloneable view of one sensor's latest state.
#[derive(Debug, Clone)]
pub struct SensorStatus {
    info: Arc<SensorInfo>,
    rx: watch::Receiver<Arc<Snapshot>>,
    humidity_alert_enabled: bool,
    low_light_alert_enabled: bool,
}

impl SensorStatus {
    pub fn new(config: &SensorConfig, rx: watch::Receiver<Arc<Snapshot>>) -> Self {
        Self {
            info: Arc::new(SensorInfo::from_config(config)),
            rx,
            humidity_alert_enabled: config.thresholds.humidity_alert_level.is_some(),
            low_light_alert_enabled: config.thresholds.low_light_alert_level.is_some(),
        }
    }

    pub fn info(&self) -> &SensorInfo {
        &self.info
    }

    /// The published snapshot as a whole.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.rx.borrow())
    }

    // --- Sensor values ---

    /// Temperature in °C, `0.0` before the first reading.
    pub fn temperature(&self) -> f32 {
        self.rx.borrow().sensor.map_or(0.0, |s| s.temperature)
    }

    /// Illuminance in lux, `0` before the first reading.
    pub fn light_level(&self) -> u32 {
        self.rx.borrow().sensor.map_or(0, |s| s.light)
    }

    /// Soil moisture in percent, `0` before the first reading.
    pub fn moisture(&self) -> u8 {
        self.rx.borrow().sensor.map_or(0, |s| s.moisture)
    }

    /// Soil fertility in µS/cm, `0` before the first reading.
    pub fn fertility(&self) -> u16 {
        self.rx.borrow().sensor.map_or(0, |s| s.fertility)
    }

    // --- Firmware and battery ---

    pub fn firmware_version(&self) -> String {
        self.rx
            .borrow()
            .firmware
            .as_ref()
            .map_or_else(|| DEFAULT_FIRMWARE_VERSION.to_string(), |f| f.version.clone())
    }

    pub fn battery_level(&self) -> u8 {
        self.rx.borrow().firmware.as_ref().map_or(0, |f| f.battery)
    }

    /// Always [`ChargingState::NotChargeable`]; the sensor runs on a coin cell.
    pub fn charging_state(&self) -> ChargingState {
        ChargingState::NotChargeable
    }

    // --- Alerts ---

    pub fn active(&self) -> bool {
        self.rx.borrow().alerts.active
    }

    /// Battery status against the configured low-battery level.
    pub fn low_battery_status(&self) -> BatteryStatus {
        self.rx.borrow().alerts.low_battery
    }

    /// Battery status against the fixed critical level.
    pub fn critical_battery_status(&self) -> BatteryStatus {
        self.rx.borrow().alerts.critical_battery
    }

    /// `None` when humidity alerting is not configured.
    pub fn humidity_alert_status(&self) -> Option<AlertStatus> {
        self.rx.borrow().alerts.humidity
    }

    /// `None` when low-light alerting is not configured.
    pub fn low_light_alert_status(&self) -> Option<AlertStatus> {
        self.rx.borrow().alerts.low_light
    }

    pub fn exposed_services(&self) -> Vec<ExposedService> {
        let mut services = vec![
            ExposedService::Information,
            ExposedService::Temperature,
            ExposedService::Light,
            ExposedService::Battery,
            ExposedService::PlantSensor,
        ];
        if self.humidity_alert_enabled {
            services.push(ExposedService::HumidityAlert);
        }
        if self.low_light_alert_enabled {
            services.push(ExposedService::LowLightAlert);
        }
        services
    }

    /// All accessors at once, taken from a single snapshot.
    pub fn report(&self) -> StatusReport {
        let snapshot = self.snapshot();
        let sensor = snapshot.sensor.unwrap_or_default();

        StatusReport {
            info: (*self.info).clone(),
            temperature: sensor.temperature,
            light_level: sensor.light,
            moisture: sensor.moisture,
            fertility: sensor.fertility,
            firmware_version: snapshot
                .firmware
                .as_ref()
                .map_or_else(|| DEFAULT_FIRMWARE_VERSION.to_string(), |f| f.version.clone()),
            battery_level: snapshot.firmware.as_ref().map_or(0, |f| f.battery),
            charging_state: self.charging_state(),
            active: snapshot.alerts.active,
            low_battery: snapshot.alerts.low_battery,
            critical_battery: snapshot.alerts.critical_battery,
            humidity_alert: snapshot.alerts.humidity,
            low_light_alert: snapshot.alerts.low_light,
            services: self.exposed_services(),
            updated_at: snapshot.updated_at,
        }
    }
}

/// Serializable view of every status accessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub info: SensorInfo,
    pub temperature: f32,
    pub light_level: u32,
    pub moisture: u8,
    pub fertility: u16,
    pub firmware_version: String,
    pub battery_level: u8,
    pub charging_state: ChargingState,
    pub active: bool,
    pub low_battery: BatteryStatus,
    pub critical_battery: BatteryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_alert: Option<AlertStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_light_alert: Option<AlertStatus>,
    pub services: Vec<ExposedService>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}
