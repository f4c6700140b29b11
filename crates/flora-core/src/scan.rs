//! BLE discovery through btleplug.
//!
//! [`BleTransport`] scans on the first Bluetooth adapter and reports every
//! peripheral it has seen as a [`FloraPeripheral`]. The scan ends as soon as
//! all requested addresses have shown up or the attempt's timeout elapses.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::device::{ConnectionConfig, FloraPeripheral};
use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::traits::{DiscoverOptions, FloraDevice, FloraTransport, SharedDevice};
use crate::util::create_identifier;

/// How often the adapter's peripheral list is checked during a scan.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Transport backed by a real Bluetooth adapter.
#[derive(Debug, Clone)]
pub struct BleTransport {
    adapter: Adapter,
    connection: ConnectionConfig,
}

impl BleTransport {
    /// Use the first Bluetooth adapter of the system.
    pub async fn new() -> Result<Self> {
        Ok(Self::with_adapter(get_adapter().await?))
    }

    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            connection: ConnectionConfig::default(),
        }
    }

    /// Timeouts used by the handles this transport returns.
    #[must_use]
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    async fn collect_peripherals(&self, options: &DiscoverOptions) -> Result<Vec<FloraPeripheral>> {
        let peripherals = self.adapter.peripherals().await?;
        let mut found = Vec::new();

        for peripheral in peripherals {
            let properties = match peripheral.properties().await {
                Ok(Some(properties)) => properties,
                Ok(None) => continue,
                Err(err) => {
                    debug!("Error reading peripheral properties: {}", err);
                    continue;
                }
            };

            let address = create_identifier(&properties.address.to_string(), &peripheral.id());
            if !options.addresses.is_empty() && !options.addresses.contains(&address) {
                continue;
            }

            found.push(FloraPeripheral::new(
                peripheral,
                address,
                properties.local_name,
                self.connection.clone(),
            ));
        }

        Ok(found)
    }
}

/// Stops the scan when dropped, including when the discovery is cancelled
/// by an outer timeout.
struct ScanGuard {
    adapter: Option<Adapter>,
}

impl ScanGuard {
    async fn stop(mut self) {
        if let Some(adapter) = self.adapter.take()
            && let Err(err) = adapter.stop_scan().await
        {
            warn!(%err, "Failed to stop BLE scan");
        }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(async move {
                    if let Err(err) = adapter.stop_scan().await {
                        warn!(%err, "Failed to stop BLE scan in guard drop");
                    }
                });
            } else {
                warn!("No tokio runtime available to stop BLE scan");
            }
        }
    }
}

#[async_trait]
impl FloraTransport for BleTransport {
    async fn discover(&self, options: &DiscoverOptions) -> Result<Vec<SharedDevice>> {
        info!(
            "Starting BLE scan for up to {} seconds...",
            options.timeout.as_secs()
        );

        let deadline = Instant::now() + options.timeout;
        self.adapter.start_scan(ScanFilter::default()).await?;
        let guard = ScanGuard {
            adapter: Some(self.adapter.clone()),
        };

        let found = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(SCAN_POLL_INTERVAL.min(remaining)).await;

            let found = self.collect_peripherals(options).await?;
            let all_seen = !options.addresses.is_empty()
                && options
                    .addresses
                    .iter()
                    .all(|address| found.iter().any(|device| device.address() == address));

            if all_seen || Instant::now() >= deadline {
                break found;
            }
        };

        guard.stop().await;

        info!("Scan complete. Found {} device(s)", found.len());
        Ok(found
            .into_iter()
            .map(|device| std::sync::Arc::new(device) as SharedDevice)
            .collect())
    }
}
