//! Polling engine for Xiaomi Mi Flora soil sensors.
//!
//! This crate keeps the latest readings of any number of Mi Flora ("Flower
//! Care") sensors up to date over Bluetooth Low Energy, while making sure the
//! process never has more than one scan in flight.
//!
//! # Components
//!
//! - **Radio arbiter** ([`RadioArbiter`]): process-wide FIFO lock over the
//!   radio with a cool-down between turns
//! - **Discovery** ([`DiscoveryClient`]): find one device by address, with
//!   bounded retries; misses are not errors
//! - **Device cache** ([`DeviceCache`]): per-sensor discovered handle
//! - **Poller** ([`SensorPoller`]): per-sensor interval loop driving
//!   discovery, query and update
//! - **Snapshot engine** ([`SnapshotEngine`]): publishes readings and derived
//!   alerts atomically
//! - **Status surface** ([`SensorStatus`]): non-blocking accessors for a host
//!
//! Radio access goes through the [`FloraTransport`] and [`FloraDevice`]
//! traits, implemented by [`BleTransport`] (btleplug) and by the in-memory
//! [`MockTransport`].
//!
//! # Platform Differences
//!
//! On Linux and Windows sensors are identified by their MAC address. On macOS
//! CoreBluetooth hides MAC addresses, so the peripheral UUID is used instead;
//! it is stable per Mac but differs between machines.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use flora_core::{BleTransport, RadioArbiter, SensorConfig, SensorPoller};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let arbiter = RadioArbiter::default();
//!
//!     let config = SensorConfig::new("C4:7C:8D:6A:12:34")
//!         .name("Basil")
//!         .humidity_alert_level(15);
//!     let poller = Arc::new(SensorPoller::new(config, arbiter, transport));
//!     let status = poller.status();
//!
//!     let cancel = CancellationToken::new();
//!     let handle = poller.spawn(cancel.clone());
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     println!("Moisture: {}%", status.moisture());
//!
//!     cancel.cancel();
//!     handle.await?;
//!     Ok(())
//! }
//! ```

pub mod arbiter;
pub mod cache;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod mock;
pub mod poller;
pub mod scan;
pub mod snapshot;
pub mod status;
pub mod thresholds;
pub mod traits;
pub mod util;

pub use flora_types::types;
pub use flora_types::uuid;

pub use arbiter::{DEFAULT_COOLDOWN, RadioArbiter, RadioTurn};
pub use cache::DeviceCache;
pub use config::SensorConfig;
pub use device::{ConnectionConfig, FloraPeripheral};
pub use discovery::{DISCOVERY_GRACE, DiscoveryClient};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use mock::{MockDevice, MockDeviceBuilder, MockTransport};
pub use poller::{PollOutcome, PollState, PollStats, SensorPoller};
pub use scan::BleTransport;
pub use snapshot::{AlertState, Snapshot, SnapshotEngine};
pub use status::{ExposedService, SensorInfo, SensorStatus, StatusReport};
pub use thresholds::{ThresholdConfig, Thresholds};
pub use traits::{DiscoverOptions, FloraDevice, FloraTransport, SharedDevice};

// Re-export commonly used types from flora-types
pub use flora_types::{
    AlertStatus, BatteryStatus, ChargingState, FirmwareInfo, ParseError, RawReading,
    SensorValues,
};

// Re-export btleplug types needed by users
pub use btleplug::api::PeripheralProperties;
pub use btleplug::platform::{Adapter, Peripheral};
