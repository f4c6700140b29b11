//! Bluetooth UUIDs for Mi Flora sensors.
//!
//! The sensor exposes its live readings through a single vendor service. A
//! mode-change write is required before the data characteristic returns real
//! values instead of a fixed placeholder pattern.

use uuid::{Uuid, uuid};

// --- Xiaomi Service UUIDs ---

/// Data service holding the mode, sensor data and firmware characteristics.
pub const DATA_SERVICE: Uuid = uuid!("00001204-0000-1000-8000-00805f9b34fb");

// --- Mi Flora Characteristic UUIDs ---

/// Mode-change characteristic. Writing [`REALTIME_MODE_COMMAND`](crate::REALTIME_MODE_COMMAND)
/// switches the sensor into real-time data mode.
pub const MODE_CHANGE: Uuid = uuid!("00001a00-0000-1000-8000-00805f9b34fb");

/// Real-time sensor data (temperature, light, moisture, fertility).
pub const SENSOR_DATA: Uuid = uuid!("00001a01-0000-1000-8000-00805f9b34fb");

/// Battery level and firmware version.
pub const FIRMWARE_BATTERY: Uuid = uuid!("00001a02-0000-1000-8000-00805f9b34fb");
