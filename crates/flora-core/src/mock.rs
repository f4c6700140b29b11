//! Mock transport and device for testing.
//!
//! This module provides an in-memory radio that can be used for unit testing
//! without requiring actual BLE hardware.
//!
//! [`MockTransport`] implements [`FloraTransport`] and hands out
//! [`MockDevice`]s, which implement [`FloraDevice`], so the whole polling
//! engine can run against it unchanged.
//!
//! # Features
//!
//! - **Failure injection**: transport errors, missed discoveries, query and
//!   disconnect failures, panics during a query
//! - **Latency simulation**: artificial delays for discovery and queries
//! - **Concurrency accounting**: the transport records the highest number of
//!   discoveries that were ever in flight at the same time

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use flora_types::{FirmwareInfo, RawReading, SensorValues};

use crate::error::{Error, Result};
use crate::traits::{DiscoverOptions, FloraDevice, FloraTransport, SharedDevice};
use crate::util::normalize_address;

/// A mock Mi Flora sensor.
///
/// # Example
///
/// ```
/// use flora_core::{FloraDevice, MockDevice};
///
/// #[tokio::main]
/// async fn main() {
///     let device = MockDevice::builder().moisture(12).battery(40).build();
///     let reading = device.query().await.unwrap();
///     assert_eq!(reading.sensor.moisture, 12);
/// }
/// ```
pub struct MockDevice {
    address: String,
    reading: RwLock<RawReading>,
    connected: AtomicBool,
    query_count: AtomicU32,
    disconnect_count: AtomicU32,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
    fail_disconnect: AtomicBool,
    panic_on_query: AtomicBool,
    /// Simulated query latency in milliseconds (0 = no delay).
    query_latency_ms: AtomicU64,
    /// Number of queries to fail before succeeding.
    remaining_failures: AtomicU32,
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockDevice {
    /// Create a mock device with default readings at `address`.
    pub fn new(address: &str) -> Self {
        MockDeviceBuilder::new().address(address).build()
    }

    /// Start building a mock device.
    pub fn builder() -> MockDeviceBuilder {
        MockDeviceBuilder::new()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Replace the reading returned by future queries.
    pub async fn set_reading(&self, reading: RawReading) {
        *self.reading.write().await = reading;
    }

    pub async fn set_moisture(&self, moisture: u8) {
        self.reading.write().await.sensor.moisture = moisture;
    }

    pub async fn set_light(&self, light: u32) {
        self.reading.write().await.sensor.light = light;
    }

    pub async fn set_battery(&self, battery: u8) {
        self.reading.write().await.firmware.battery = battery;
    }

    /// Make every query fail (or succeed again).
    pub async fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *self.fail_message.write().await = msg.to_string();
        }
    }

    /// Make disconnects fail.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::Relaxed);
    }

    /// Make the next queries panic instead of returning.
    pub fn set_panic_on_query(&self, panic: bool) {
        self.panic_on_query.store(panic, Ordering::Relaxed);
    }

    /// Set simulated query latency.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_query_latency(&self, latency: Duration) {
        self.query_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Fail the next `count` queries, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Number of successful queries.
    pub fn query_count(&self) -> u32 {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Number of disconnect calls, failed or not.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FloraDevice for MockDevice {
    fn address(&self) -> &str {
        &self.address
    }

    async fn query(&self) -> Result<RawReading> {
        let latency = self.query_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.panic_on_query.load(Ordering::Relaxed) {
            panic!("mock device {} panicked during query", self.address);
        }

        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::QueryFailed("transient mock failure".to_string()));
        }

        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::QueryFailed(self.fail_message.read().await.clone()));
        }

        self.connected.store(true, Ordering::Relaxed);
        self.query_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.reading.read().await.clone())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_disconnect.load(Ordering::Relaxed) {
            return Err(Error::connection_failed(
                self.address.clone(),
                "mock disconnect failure",
            ));
        }
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }
}

/// Builder for creating mock devices with custom settings.
#[derive(Debug, Clone)]
pub struct MockDeviceBuilder {
    address: Option<String>,
    temperature: f32,
    light: u32,
    moisture: u8,
    fertility: u16,
    firmware: String,
    battery: u8,
}

impl Default for MockDeviceBuilder {
    fn default() -> Self {
        Self {
            address: None,
            temperature: 21.8,
            light: 652,
            moisture: 41,
            fertility: 273,
            firmware: "3.3.1".to_string(),
            battery: 85,
        }
    }
}

impl MockDeviceBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device address. Defaults to a random Xiaomi-prefixed MAC.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn light(mut self, light: u32) -> Self {
        self.light = light;
        self
    }

    #[must_use]
    pub fn moisture(mut self, moisture: u8) -> Self {
        self.moisture = moisture;
        self
    }

    #[must_use]
    pub fn fertility(mut self, fertility: u16) -> Self {
        self.fertility = fertility;
        self
    }

    #[must_use]
    pub fn firmware(mut self, firmware: &str) -> Self {
        self.firmware = firmware.to_string();
        self
    }

    #[must_use]
    pub fn battery(mut self, battery: u8) -> Self {
        self.battery = battery;
        self
    }

    #[must_use]
    pub fn build(self) -> MockDevice {
        let address = self.address.map(|a| normalize_address(&a)).unwrap_or_else(|| {
            let suffix = rand::random::<u32>() & 0x00FF_FFFF;
            format!(
                "c4:7c:8d:{:02x}:{:02x}:{:02x}",
                (suffix >> 16) & 0xFF,
                (suffix >> 8) & 0xFF,
                suffix & 0xFF
            )
        });

        let reading = RawReading {
            sensor: SensorValues {
                temperature: self.temperature,
                light: self.light,
                moisture: self.moisture,
                fertility: self.fertility,
            },
            firmware: FirmwareInfo {
                version: self.firmware,
                battery: self.battery,
            },
        };

        MockDevice {
            address,
            reading: RwLock::new(reading),
            connected: AtomicBool::new(false),
            query_count: AtomicU32::new(0),
            disconnect_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            fail_message: RwLock::new("Mock failure".to_string()),
            fail_disconnect: AtomicBool::new(false),
            panic_on_query: AtomicBool::new(false),
            query_latency_ms: AtomicU64::new(0),
            remaining_failures: AtomicU32::new(0),
        }
    }
}

/// An in-memory radio.
///
/// Devices added with [`MockTransport::add_device`] are reported by every
/// discovery unless a miss or failure has been injected.
#[derive(Debug, Default)]
pub struct MockTransport {
    devices: StdRwLock<Vec<Arc<MockDevice>>>,
    discover_count: AtomicU32,
    missed_discoveries: AtomicU32,
    discover_latency_ms: AtomicU64,
    should_fail: AtomicBool,
    fail_message: StdRwLock<Option<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter even when the discovery future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device in radio range and return a handle for inspection.
    pub fn add_device(&self, device: MockDevice) -> Arc<MockDevice> {
        let device = Arc::new(device);
        self.devices
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::clone(&device));
        device
    }

    /// Remove a device from radio range.
    pub fn remove_device(&self, address: &str) {
        let address = normalize_address(address);
        self.devices
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|device| normalize_address(&device.address) != address);
    }

    /// Make every discovery fail with a radio error (or succeed again).
    pub fn set_should_fail(&self, fail: bool, message: Option<String>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if message.is_some() {
            *self
                .fail_message
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = message;
        }
    }

    /// The next `count` discoveries see nothing.
    pub fn set_missed_discoveries(&self, count: u32) {
        self.missed_discoveries.store(count, Ordering::Relaxed);
    }

    /// Set simulated discovery latency.
    pub fn set_discover_latency(&self, latency: Duration) {
        self.discover_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of discovery calls made so far.
    pub fn discover_count(&self) -> u32 {
        self.discover_count.load(Ordering::Relaxed)
    }

    /// Highest number of discoveries observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FloraTransport for MockTransport {
    async fn discover(&self, options: &DiscoverOptions) -> Result<Vec<SharedDevice>> {
        self.discover_count.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = self.discover_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.should_fail.load(Ordering::Relaxed) {
            let message = self
                .fail_message
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
                .unwrap_or_else(|| "mock radio failure".to_string());
            return Err(Error::Bluetooth(btleplug::Error::RuntimeError(message)));
        }

        if self.missed_discoveries.load(Ordering::Relaxed) > 0 {
            self.missed_discoveries.fetch_sub(1, Ordering::Relaxed);
            return Ok(Vec::new());
        }

        let devices = self
            .devices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|device| {
                options.addresses.is_empty()
                    || options
                        .addresses
                        .contains(&normalize_address(&device.address))
            })
            .map(|device| Arc::clone(device) as SharedDevice)
            .collect();

        Ok(devices)
    }
}
