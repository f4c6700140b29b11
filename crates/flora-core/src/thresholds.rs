//! Alert thresholds for soil sensors.
//!
//! Humidity and light alerts are opt-in: they are only evaluated when a
//! threshold has been configured. The low-battery alert is always evaluated
//! against a configurable level, and a second fixed level
//! ([`CRITICAL_BATTERY_LEVEL`]) drives the separate battery status field.
//!
//! Until a reading arrives, enabled alerts report
//! [`AlertStatus::Triggered`] so an unread sensor never looks healthy.
//!
//! # Example
//!
//! ```
//! use flora_core::{ThresholdConfig, Thresholds};
//! use flora_types::{AlertStatus, BatteryStatus};
//!
//! let thresholds = Thresholds::new(ThresholdConfig {
//!     humidity_alert_level: Some(10),
//!     ..Default::default()
//! });
//!
//! assert_eq!(thresholds.humidity_alert(Some(5)), Some(AlertStatus::Triggered));
//! assert_eq!(thresholds.humidity_alert(Some(50)), Some(AlertStatus::Normal));
//! assert_eq!(thresholds.low_light_alert(Some(0)), None);
//! assert_eq!(thresholds.low_battery(Some(8)), BatteryStatus::Low);
//! ```

use serde::{Deserialize, Serialize};

use flora_types::{AlertStatus, BatteryStatus, FirmwareInfo, SensorValues};

use crate::snapshot::AlertState;

/// Battery level at or below which the battery status field reports low,
/// independent of the configured alert level.
pub const CRITICAL_BATTERY_LEVEL: u8 = 20;

/// Default configurable low-battery alert level.
pub const DEFAULT_LOW_BATTERY_LEVEL: u8 = 10;

fn default_low_battery_level() -> u8 {
    DEFAULT_LOW_BATTERY_LEVEL
}

/// Configured alert thresholds for one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Moisture percentage at or below which the humidity alert triggers.
    #[serde(default)]
    pub humidity_alert_level: Option<u8>,
    /// Illuminance in lux at or below which the low-light alert triggers.
    #[serde(default)]
    pub low_light_alert_level: Option<u32>,
    /// Battery percentage at or below which the low-battery alert triggers.
    #[serde(default = "default_low_battery_level")]
    pub low_battery_level: u8,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            humidity_alert_level: None,
            low_light_alert_level: None,
            low_battery_level: DEFAULT_LOW_BATTERY_LEVEL,
        }
    }
}

/// Threshold evaluator.
#[derive(Debug, Clone, Default)]
pub struct Thresholds {
    config: ThresholdConfig,
}

impl Thresholds {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn humidity_alert_enabled(&self) -> bool {
        self.config.humidity_alert_level.is_some()
    }

    pub fn low_light_alert_enabled(&self) -> bool {
        self.config.low_light_alert_level.is_some()
    }

    /// Configured low-battery alert. `Normal` while the battery is unknown.
    pub fn low_battery(&self, battery: Option<u8>) -> BatteryStatus {
        battery.map_or(BatteryStatus::Normal, |level| {
            BatteryStatus::evaluate(level, self.config.low_battery_level)
        })
    }

    /// Fixed critical battery status. `Normal` while the battery is unknown.
    pub fn critical_battery(&self, battery: Option<u8>) -> BatteryStatus {
        battery.map_or(BatteryStatus::Normal, |level| {
            BatteryStatus::evaluate(level, CRITICAL_BATTERY_LEVEL)
        })
    }

    /// Humidity alert, `None` when disabled.
    pub fn humidity_alert(&self, moisture: Option<u8>) -> Option<AlertStatus> {
        let level = self.config.humidity_alert_level?;
        Some(moisture.map_or(AlertStatus::Triggered, |value| {
            AlertStatus::evaluate(value, level)
        }))
    }

    /// Low-light alert, `None` when disabled.
    pub fn low_light_alert(&self, light: Option<u32>) -> Option<AlertStatus> {
        let level = self.config.low_light_alert_level?;
        Some(light.map_or(AlertStatus::Triggered, |value| {
            AlertStatus::evaluate(value, level)
        }))
    }

    /// Derive every alert from the current snapshot fields.
    pub fn evaluate(
        &self,
        sensor: Option<&SensorValues>,
        firmware: Option<&FirmwareInfo>,
    ) -> AlertState {
        let battery = firmware.map(|info| info.battery);

        AlertState {
            low_battery: self.low_battery(battery),
            critical_battery: self.critical_battery(battery),
            humidity: self.humidity_alert(sensor.map(|values| values.moisture)),
            low_light: self.low_light_alert(sensor.map(|values| values.light)),
            active: sensor.is_some() || firmware.is_some(),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The humidity alert triggers exactly at or below the configured level.
        #[test]
        fn humidity_alert_matches_comparison(moisture in 0u8..=100, level in 0u8..=100) {
            let thresholds = Thresholds::new(ThresholdConfig {
                humidity_alert_level: Some(level),
                ..Default::default()
            });
            let triggered = thresholds.humidity_alert(Some(moisture)) == Some(AlertStatus::Triggered);
            prop_assert_eq!(triggered, moisture <= level);
        }

        /// Whatever the configured level, the critical status only depends on the fixed level.
        #[test]
        fn critical_battery_is_independent_of_config(battery in 0u8..=100, level in 0u8..=100) {
            let thresholds = Thresholds::new(ThresholdConfig {
                low_battery_level: level,
                ..Default::default()
            });
            prop_assert_eq!(
                thresholds.critical_battery(Some(battery)).is_low(),
                battery <= CRITICAL_BATTERY_LEVEL
            );
            prop_assert_eq!(thresholds.low_battery(Some(battery)).is_low(), battery <= level);
        }
    }
}
