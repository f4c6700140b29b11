//! Mi Flora device communication over btleplug.
//!
//! A [`FloraPeripheral`] is the handle returned by
//! [`BleTransport`](crate::BleTransport) discovery. Each query connects if
//! needed, switches the sensor into real-time mode and reads the sensor and
//! firmware characteristics.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use flora_types::uuid::{DATA_SERVICE, FIRMWARE_BATTERY, MODE_CHANGE, SENSOR_DATA};
use flora_types::{REALTIME_MODE_COMMAND, RawReading};

use crate::error::{Error, Result};
use crate::traits::FloraDevice;

/// Default timeout for establishing a BLE connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for characteristic reads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for characteristic writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for GATT service discovery after connecting.
pub const DEFAULT_SERVICE_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeouts applied to the individual BLE operations of a query.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use flora_core::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .read_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for BLE read operations.
    pub read_timeout: Duration,
    /// Timeout for BLE write operations.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_SERVICE_DISCOVERY_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

/// A discovered Mi Flora sensor reachable through btleplug.
///
/// The peripheral is only connected while a query runs; the poller
/// disconnects after every successful query, and a failed query drops the
/// link itself.
pub struct FloraPeripheral {
    peripheral: Peripheral,
    address: String,
    name: Option<String>,
    config: ConnectionConfig,
}

impl std::fmt::Debug for FloraPeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloraPeripheral")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FloraPeripheral {
    pub fn new(
        peripheral: Peripheral,
        address: String,
        name: Option<String>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            peripheral,
            address,
            name,
            config,
        }
    }

    /// Advertised local name, usually `"Flower care"`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn ensure_connected(&self) -> Result<()> {
        if !self.peripheral.is_connected().await? {
            debug!("Connecting to device...");
            timeout(self.config.connection_timeout, self.peripheral.connect())
                .await
                .map_err(|_| {
                    Error::connection_failed(
                        self.address.clone(),
                        format!("connect timed out after {:?}", self.config.connection_timeout),
                    )
                })??;
        }

        if self.peripheral.services().is_empty() {
            debug!("Discovering services...");
            timeout(
                self.config.discovery_timeout,
                self.peripheral.discover_services(),
            )
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))??;
            debug!("Found {} services", self.peripheral.services().len());
        }

        Ok(())
    }

    fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| {
                characteristic.service_uuid == DATA_SERVICE && characteristic.uuid == uuid
            })
            .ok_or_else(|| {
                Error::characteristic_not_found(uuid.to_string(), self.peripheral.services().len())
            })
    }

    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let characteristic = self.find_characteristic(uuid)?;
        let data = timeout(self.config.read_timeout, self.peripheral.read(&characteristic))
            .await
            .map_err(|_| {
                Error::timeout(format!("read characteristic {}", uuid), self.config.read_timeout)
            })??;
        Ok(data)
    }

    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        let characteristic = self.find_characteristic(uuid)?;
        timeout(
            self.config.write_timeout,
            self.peripheral
                .write(&characteristic, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(format!("write characteristic {}", uuid), self.config.write_timeout)
        })??;
        Ok(())
    }

    async fn read_reading(&self) -> Result<RawReading> {
        self.ensure_connected().await?;
        self.write_characteristic(MODE_CHANGE, &REALTIME_MODE_COMMAND)
            .await?;
        let sensor = self.read_characteristic(SENSOR_DATA).await?;
        let firmware = self.read_characteristic(FIRMWARE_BATTERY).await?;
        Ok(RawReading::from_characteristics(&sensor, &firmware)?)
    }
}

#[async_trait]
impl FloraDevice for FloraPeripheral {
    fn address(&self) -> &str {
        &self.address
    }

    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    async fn query(&self) -> Result<RawReading> {
        match self.read_reading().await {
            Ok(reading) => {
                info!("Query complete");
                Ok(reading)
            }
            Err(err) => {
                if let Err(disconnect_err) = self.peripheral.disconnect().await {
                    warn!(%disconnect_err, "Failed to disconnect after failed query");
                }
                Err(err)
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        if self.peripheral.is_connected().await? {
            debug!(address = %self.address, "Disconnecting from device...");
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}
