//! Service configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use flora_core::thresholds::DEFAULT_LOW_BATTERY_LEVEL;
use flora_core::util::{is_valid_address, normalize_address};
use flora_core::{RadioArbiter, SensorConfig};

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP status API settings.
    pub server: ServerConfig,
    /// Shared radio settings.
    pub radio: RadioConfig,
    /// Sensors to poll.
    pub sensors: Vec<SensorEntry>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// This checks:
    /// - Server bind address parses as `host:port`
    /// - Discovery attempts are at least one
    /// - Sensor addresses are well-formed and unique
    /// - Sensor names are unique
    /// - Humidity and battery levels are percentages
    ///
    /// Poll intervals are clamped when sensors are built, not rejected here.
    ///
    /// # Example
    ///
    /// ```
    /// use flora_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.radio.validate());

        let mut seen_addresses = HashSet::new();
        let mut seen_names = HashSet::new();
        for (i, sensor) in self.sensors.iter().enumerate() {
            let prefix = format!("sensors[{}]", i);
            errors.extend(sensor.validate(&prefix));

            if !seen_addresses.insert(normalize_address(&sensor.address)) {
                errors.push(ValidationError {
                    field: format!("{}.address", prefix),
                    message: format!("duplicate sensor address '{}'", sensor.address),
                });
            }
            if !seen_names.insert(sensor.name.clone()) {
                errors.push(ValidationError {
                    field: format!("{}.name", prefix),
                    message: format!("duplicate sensor name '{}'", sensor.name),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Engine configuration for every sensor entry.
    ///
    /// `host` is used to derive the default serial number.
    pub fn sensor_configs(&self, host: &str) -> Vec<SensorConfig> {
        self.sensors
            .iter()
            .map(|entry| entry.to_sensor_config(&self.radio, host))
            .collect()
    }
}

/// HTTP status API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// Whether to serve the status API at all.
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            enabled: true,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            match self.bind.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                    Ok(0) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: "port cannot be 0".to_string(),
                    }),
                    Ok(_) => {}
                    Err(_) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: format!("invalid port '{}': must be a number 1-65535", port),
                    }),
                },
                _ => errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                }),
            }
        }

        errors
    }
}

/// Settings of the radio shared by all sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Pause between two radio turns in seconds.
    pub cooldown_secs: u64,
    /// Upper bound for one discovery attempt in seconds.
    pub scan_timeout_secs: u64,
    /// Discovery attempts per poll cycle.
    pub discovery_attempts: u32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: flora_core::DEFAULT_COOLDOWN.as_secs(),
            scan_timeout_secs: flora_core::discovery::DEFAULT_SCAN_TIMEOUT.as_secs(),
            discovery_attempts: flora_core::discovery::DEFAULT_DISCOVERY_ATTEMPTS,
        }
    }
}

impl RadioConfig {
    /// Validate radio configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.discovery_attempts == 0 {
            errors.push(ValidationError {
                field: "radio.discovery_attempts".to_string(),
                message: "discovery attempts must be at least 1".to_string(),
            });
        }
        if self.scan_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "radio.scan_timeout_secs".to_string(),
                message: "scan timeout cannot be 0".to_string(),
            });
        }

        errors
    }

    /// The process-wide arbiter for these settings.
    pub fn arbiter(&self) -> RadioArbiter {
        RadioArbiter::new(Duration::from_secs(self.cooldown_secs))
    }
}

/// Configuration of one sensor.
///
/// Keys also accept the camelCase names used by Homebridge accessory configs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    /// Display name, also used in API paths.
    #[serde(default = "default_name")]
    pub name: String,
    /// Radio address (MAC, or peripheral UUID on macOS).
    #[serde(alias = "deviceId")]
    pub address: String,
    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval", alias = "interval")]
    pub poll_interval: u64,
    /// Moisture percentage at or below which the humidity alert triggers.
    #[serde(default, alias = "humidityAlertLevel")]
    pub humidity_alert_level: Option<u8>,
    /// Lux at or below which the low-light alert triggers.
    #[serde(default, alias = "lowLightAlertLevel")]
    pub low_light_alert_level: Option<u32>,
    /// Battery percentage at or below which the battery is reported low.
    #[serde(default = "default_low_battery_level", alias = "lowBatteryWarningLevel")]
    pub low_battery_level: u8,
    /// Drop the cached device handle after this many failed queries in a row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidate_after_failures: Option<u32>,
    /// Serial number reported to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

fn default_name() -> String {
    flora_core::config::DEFAULT_NAME.to_string()
}

fn default_poll_interval() -> u64 {
    flora_core::config::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_low_battery_level() -> u8 {
    DEFAULT_LOW_BATTERY_LEVEL
}

impl SensorEntry {
    /// A sensor entry with defaults for everything but the address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            address: address.into(),
            poll_interval: default_poll_interval(),
            humidity_alert_level: None,
            low_light_alert_level: None,
            low_battery_level: DEFAULT_LOW_BATTERY_LEVEL,
            invalidate_after_failures: None,
            serial: None,
        }
    }

    /// Validate sensor configuration.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.address", prefix),
                message: "sensor address cannot be empty".to_string(),
            });
        } else if !is_valid_address(&self.address) {
            errors.push(ValidationError {
                field: format!("{}.address", prefix),
                message: format!(
                    "invalid sensor address '{}': expected a MAC address or peripheral UUID",
                    self.address
                ),
            });
        }

        if self.name.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.name", prefix),
                message: "sensor name cannot be empty".to_string(),
            });
        }

        if let Some(level) = self.humidity_alert_level
            && level > 100
        {
            errors.push(ValidationError {
                field: format!("{}.humidity_alert_level", prefix),
                message: format!("humidity alert level {} exceeds 100%", level),
            });
        }

        if self.low_battery_level > 100 {
            errors.push(ValidationError {
                field: format!("{}.low_battery_level", prefix),
                message: format!("low battery level {} exceeds 100%", self.low_battery_level),
            });
        }

        errors
    }

    /// Engine configuration for this sensor.
    ///
    /// The poll interval is clamped into the accepted range. Without an
    /// explicit serial, `<host>-<name>` is used.
    pub fn to_sensor_config(&self, radio: &RadioConfig, host: &str) -> SensorConfig {
        let serial = self
            .serial
            .clone()
            .unwrap_or_else(|| format!("{}-{}", host, self.name));

        let mut config = SensorConfig::new(&self.address)
            .name(self.name.clone())
            .poll_interval(Duration::from_secs(self.poll_interval))
            .low_battery_level(self.low_battery_level)
            .scan_timeout(Duration::from_secs(radio.scan_timeout_secs))
            .discovery_attempts(radio.discovery_attempts)
            .invalidate_after_failures(self.invalidate_after_failures)
            .serial(serial);

        if let Some(level) = self.humidity_alert_level {
            config = config.humidity_alert_level(level);
        }
        if let Some(level) = self.low_light_alert_level {
            config = config.low_light_alert_level(level);
        }
        config
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `sensors[0].address`).
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flora")
        .join("service.toml")
}
