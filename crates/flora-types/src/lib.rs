//! Platform-agnostic types for Mi Flora soil sensors.
//!
//! This crate holds the data shared by the polling engine (flora-core) and the
//! service that exposes it (flora-service).
//!
//! # Features
//!
//! - Sensor value and firmware types with GATT payload parsers
//! - Battery, alert and charging status enums as reported to a host
//! - UUID constants for the Mi Flora BLE service and characteristics
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use flora_types::RawReading;
//!
//! let sensor = [0xda, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 41, 0x11, 0x01];
//! let firmware = [38, 0x13, b'3', b'.', b'3', b'.', b'1'];
//!
//! let reading = RawReading::from_characteristics(&sensor, &firmware).unwrap();
//! assert_eq!(reading.sensor.moisture, 41);
//! assert_eq!(reading.sensor.fertility, 273);
//! assert_eq!(reading.firmware.version, "3.3.1");
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    AlertStatus, BatteryStatus, ChargingState, FirmwareInfo, MIN_FIRMWARE_BYTES,
    MIN_SENSOR_DATA_BYTES, REALTIME_MODE_COMMAND, RawReading, SensorValues,
};
pub use uuid as uuids;
