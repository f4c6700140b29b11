//! Core types for Mi Flora sensor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Command written to the mode-change characteristic to enable real-time data.
pub const REALTIME_MODE_COMMAND: [u8; 2] = [0xA0, 0x1F];

/// Minimum number of bytes required to parse [`SensorValues`].
///
/// The characteristic returns 16 bytes; only the first 10 carry data.
pub const MIN_SENSOR_DATA_BYTES: usize = 10;

/// Minimum number of bytes required to parse [`FirmwareInfo`].
pub const MIN_FIRMWARE_BYTES: usize = 7;

/// Pattern returned by the data characteristic when the sensor has not been
/// switched into real-time mode.
const NOT_REALTIME_PATTERN: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

/// Live sensor values read from the data characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorValues {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Illuminance in lux.
    pub light: u32,
    /// Soil moisture percentage (0-100).
    pub moisture: u8,
    /// Soil fertility (conductivity) in µS/cm.
    pub fertility: u16,
}

impl SensorValues {
    /// Parse `SensorValues` from the data characteristic.
    ///
    /// The byte format is:
    /// - bytes 0-1: Temperature (i16 LE, divide by 10 for Celsius)
    /// - byte 2: unused
    /// - bytes 3-6: Light (u32 LE, lux)
    /// - byte 7: Moisture (u8, percent)
    /// - bytes 8-9: Fertility (u16 LE, µS/cm)
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer than
    /// [`MIN_SENSOR_DATA_BYTES`] bytes, and [`ParseError::InvalidData`] if the
    /// sensor answered with its placeholder pattern.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        use bytes::Buf;

        if data.len() < MIN_SENSOR_DATA_BYTES {
            return Err(ParseError::InsufficientBytes {
                what: "sensor data",
                expected: MIN_SENSOR_DATA_BYTES,
                actual: data.len(),
            });
        }

        if data.starts_with(&NOT_REALTIME_PATTERN) {
            return Err(ParseError::InvalidData(
                "sensor is not in real-time mode".to_string(),
            ));
        }

        let mut buf = data;
        let temp_raw = buf.get_i16_le();
        buf.advance(1);
        let light = buf.get_u32_le();
        let moisture = buf.get_u8();
        let fertility = buf.get_u16_le();

        Ok(SensorValues {
            temperature: f32::from(temp_raw) / 10.0,
            light,
            moisture,
            fertility,
        })
    }
}

/// Battery level and firmware version read from the firmware characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FirmwareInfo {
    /// Firmware version string, e.g. `"3.3.1"`.
    pub version: String,
    /// Battery level percentage (0-100).
    pub battery: u8,
}

impl FirmwareInfo {
    /// Parse `FirmwareInfo` from the firmware characteristic.
    ///
    /// The byte format is:
    /// - byte 0: Battery (u8, percent)
    /// - byte 1: separator
    /// - bytes 2-6: Firmware version (ASCII, NUL padded)
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer than
    /// [`MIN_FIRMWARE_BYTES`] bytes, and [`ParseError::InvalidData`] if the
    /// version is not printable ASCII.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < MIN_FIRMWARE_BYTES {
            return Err(ParseError::InsufficientBytes {
                what: "firmware data",
                expected: MIN_FIRMWARE_BYTES,
                actual: data.len(),
            });
        }

        let battery = data[0];
        let raw_version = &data[2..MIN_FIRMWARE_BYTES];
        let version = core::str::from_utf8(raw_version)
            .map_err(|_| ParseError::InvalidData(format!("firmware version {raw_version:02x?}")))?
            .trim_end_matches('\0')
            .trim();

        if version.is_empty() || !version.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ParseError::InvalidData(format!(
                "firmware version {raw_version:02x?}"
            )));
        }

        Ok(FirmwareInfo {
            version: version.to_string(),
            battery,
        })
    }
}

/// Everything one successful query of a sensor produces.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawReading {
    pub sensor: SensorValues,
    pub firmware: FirmwareInfo,
}

impl RawReading {
    /// Parse both characteristic payloads into a reading.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] hit by either payload.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_characteristics(sensor_data: &[u8], firmware_data: &[u8]) -> Result<Self, ParseError> {
        Ok(RawReading {
            sensor: SensorValues::from_bytes(sensor_data)?,
            firmware: FirmwareInfo::from_bytes(firmware_data)?,
        })
    }
}

/// Battery status as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum BatteryStatus {
    #[default]
    Normal = 0,
    Low = 1,
}

impl BatteryStatus {
    /// `Low` when `battery` is at or below `threshold`.
    #[must_use]
    pub fn evaluate(battery: u8, threshold: u8) -> Self {
        if battery <= threshold {
            BatteryStatus::Low
        } else {
            BatteryStatus::Normal
        }
    }

    #[must_use]
    pub fn is_low(self) -> bool {
        self == BatteryStatus::Low
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryStatus::Normal => write!(f, "Normal"),
            BatteryStatus::Low => write!(f, "Low"),
        }
    }
}

/// State of a threshold alert (low humidity, low light).
///
/// Hosts that model alerts as contact sensors map `Normal` to "contact
/// detected" and `Triggered` to "contact not detected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum AlertStatus {
    Normal = 0,
    Triggered = 1,
}

impl AlertStatus {
    /// `Triggered` when `value` is at or below `threshold`.
    #[must_use]
    pub fn evaluate<T: PartialOrd>(value: T, threshold: T) -> Self {
        if value <= threshold {
            AlertStatus::Triggered
        } else {
            AlertStatus::Normal
        }
    }

    #[must_use]
    pub fn is_triggered(self) -> bool {
        self == AlertStatus::Triggered
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Normal => write!(f, "Normal"),
            AlertStatus::Triggered => write!(f, "Triggered"),
        }
    }
}

/// Charging capability of the sensor. Mi Flora runs on a CR2032 coin cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum ChargingState {
    NotCharging = 0,
    Charging = 1,
    #[default]
    NotChargeable = 2,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Parsing random sensor payloads should never panic.
        #[test]
        fn parse_sensor_values_never_panics(data: Vec<u8>) {
            let _ = SensorValues::from_bytes(&data);
        }

        /// Parsing random firmware payloads should never panic.
        #[test]
        fn parse_firmware_info_never_panics(data: Vec<u8>) {
            let _ = FirmwareInfo::from_bytes(&data);
        }

        /// Every field written in the documented layout is read back unchanged.
        #[test]
        fn sensor_layout_fields_are_recovered(
            temp_raw in -400i16..=600,
            light in 0u32..=120_000,
            moisture in 0u8..=100,
            fertility in any::<u16>(),
        ) {
            let mut bytes = [0u8; 16];
            bytes[0..2].copy_from_slice(&temp_raw.to_le_bytes());
            bytes[3..7].copy_from_slice(&light.to_le_bytes());
            bytes[7] = moisture;
            bytes[8..10].copy_from_slice(&fertility.to_le_bytes());
            prop_assume!(!bytes.starts_with(&NOT_REALTIME_PATTERN));

            let values = SensorValues::from_bytes(&bytes).unwrap();
            prop_assert_eq!(values.light, light);
            prop_assert_eq!(values.moisture, moisture);
            prop_assert_eq!(values.fertility, fertility);
            prop_assert!((values.temperature - f32::from(temp_raw) / 10.0).abs() < f32::EPSILON);
        }
    }
}
