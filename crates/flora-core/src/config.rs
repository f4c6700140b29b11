//! Per-sensor configuration.
//!
//! A [`SensorConfig`] is built once per sensor and never changes afterwards.
//! The address is normalized and the poll interval is clamped as the config
//! is built.

use std::time::Duration;

use tracing::warn;

use crate::discovery::{DEFAULT_DISCOVERY_ATTEMPTS, DEFAULT_SCAN_TIMEOUT};
use crate::thresholds::ThresholdConfig;
use crate::util::normalize_address;

/// Default poll interval (30 minutes).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1800);

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Longest accepted poll interval (one day).
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(86_400);

/// Default display name of a sensor.
pub const DEFAULT_NAME: &str = "MiFlora";

/// Default manufacturer reported to the host.
pub const DEFAULT_MANUFACTURER: &str = "Xiaomi";

/// Default model reported to the host.
pub const DEFAULT_MODEL: &str = "Flower Care";

/// Clamp a poll interval into `[MIN_POLL_INTERVAL, MAX_POLL_INTERVAL]`.
pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Configuration of one polled sensor.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use flora_core::SensorConfig;
///
/// let config = SensorConfig::new("C4:7C:8D:6A:12:34")
///     .name("Basil")
///     .poll_interval(Duration::from_secs(600))
///     .humidity_alert_level(15);
///
/// assert_eq!(config.address, "c4:7c:8d:6a:12:34");
/// assert_eq!(config.thresholds.humidity_alert_level, Some(15));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// Radio address, lowercase.
    pub address: String,
    /// Display name.
    pub name: String,
    /// Time between poll cycles.
    pub poll_interval: Duration,
    /// Alert thresholds.
    pub thresholds: ThresholdConfig,
    /// Upper bound for a single discovery attempt.
    pub scan_timeout: Duration,
    /// Discovery attempts per poll cycle.
    pub discovery_attempts: u32,
    /// Drop the cached handle after this many consecutive query failures.
    /// `None` keeps the handle forever.
    pub invalidate_after_failures: Option<u32>,
    pub manufacturer: String,
    pub model: String,
    /// Serial number reported to the host. Defaults to the name.
    pub serial: Option<String>,
}

impl SensorConfig {
    pub fn new(address: impl AsRef<str>) -> Self {
        Self {
            address: normalize_address(address.as_ref()),
            name: DEFAULT_NAME.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            thresholds: ThresholdConfig::default(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            discovery_attempts: DEFAULT_DISCOVERY_ATTEMPTS,
            invalidate_after_failures: None,
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            serial: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the poll interval, clamped to the accepted range.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        let clamped = clamp_poll_interval(interval);
        if clamped != interval {
            warn!(
                "Poll interval {}s for {} out of range, using {}s",
                interval.as_secs(),
                self.address,
                clamped.as_secs()
            );
        }
        self.poll_interval = clamped;
        self
    }

    #[must_use]
    pub fn thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn humidity_alert_level(mut self, level: u8) -> Self {
        self.thresholds.humidity_alert_level = Some(level);
        self
    }

    #[must_use]
    pub fn low_light_alert_level(mut self, level: u32) -> Self {
        self.thresholds.low_light_alert_level = Some(level);
        self
    }

    #[must_use]
    pub fn low_battery_level(mut self, level: u8) -> Self {
        self.thresholds.low_battery_level = level;
        self
    }

    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the discovery attempts per cycle (at least one).
    #[must_use]
    pub fn discovery_attempts(mut self, attempts: u32) -> Self {
        self.discovery_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn invalidate_after_failures(mut self, failures: Option<u32>) -> Self {
        self.invalidate_after_failures = failures.filter(|n| *n > 0);
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SensorConfig::new("C4:7C:8D:6A:12:34");
        assert_eq!(config.address, "c4:7c:8d:6a:12:34");
        assert_eq!(config.name, "MiFlora");
        assert_eq!(config.poll_interval, Duration::from_secs(1800));
        assert_eq!(config.scan_timeout, DEFAULT_SCAN_TIMEOUT);
        assert_eq!(config.discovery_attempts, 3);
        assert_eq!(config.thresholds.low_battery_level, 10);
        assert_eq!(config.thresholds.humidity_alert_level, None);
        assert_eq!(config.invalidate_after_failures, None);
        assert_eq!(config.manufacturer, "Xiaomi");
        assert_eq!(config.model, "Flower Care");
        assert_eq!(config.serial, None);
    }

    #[test]
    fn test_poll_interval_clamped() {
        let fast = SensorConfig::new("aa").poll_interval(Duration::from_secs(5));
        assert_eq!(fast.poll_interval, MIN_POLL_INTERVAL);

        let slow = SensorConfig::new("aa").poll_interval(Duration::from_secs(1_000_000));
        assert_eq!(slow.poll_interval, MAX_POLL_INTERVAL);

        let ok = SensorConfig::new("aa").poll_interval(Duration::from_secs(600));
        assert_eq!(ok.poll_interval, Duration::from_secs(600));
    }

    #[test]
    fn test_builder_thresholds() {
        let config = SensorConfig::new("aa")
            .humidity_alert_level(15)
            .low_light_alert_level(100)
            .low_battery_level(5);

        assert_eq!(config.thresholds.humidity_alert_level, Some(15));
        assert_eq!(config.thresholds.low_light_alert_level, Some(100));
        assert_eq!(config.thresholds.low_battery_level, 5);
    }

    #[test]
    fn test_discovery_attempts_at_least_one() {
        assert_eq!(SensorConfig::new("aa").discovery_attempts(0).discovery_attempts, 1);
        assert_eq!(SensorConfig::new("aa").discovery_attempts(5).discovery_attempts, 5);
    }

    #[test]
    fn test_invalidate_after_zero_disables() {
        let config = SensorConfig::new("aa").invalidate_after_failures(Some(0));
        assert_eq!(config.invalidate_after_failures, None);

        let config = SensorConfig::new("aa").invalidate_after_failures(Some(3));
        assert_eq!(config.invalidate_after_failures, Some(3));
    }
}
