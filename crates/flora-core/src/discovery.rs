//! Address-filtered discovery with bounded retries.
//!
//! BLE discovery is lossy: a sensor that is in range regularly fails to show
//! up in a single scan. [`DiscoveryClient::discover`] therefore never fails.
//! A timeout, a radio error or simply not seeing the address all come back as
//! `None`, and [`DiscoveryClient::discover_with_retry`] repeats the attempt a
//! bounded number of times.
//!
//! Callers are expected to hold a [`RadioTurn`](crate::RadioTurn) for the
//! duration of a discovery.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{DeviceNotFoundReason, Error};
use crate::traits::{DiscoverOptions, FloraTransport, SharedDevice};
use crate::util::normalize_address;

/// Default number of discovery attempts per poll cycle.
pub const DEFAULT_DISCOVERY_ATTEMPTS: u32 = 3;

/// Default upper bound for one discovery attempt.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted to a transport past its own deadline to report what it
/// saw and stop scanning before the attempt is abandoned.
pub const DISCOVERY_GRACE: Duration = Duration::from_secs(5);

/// Discovery front-end over a [`FloraTransport`].
#[derive(Clone)]
pub struct DiscoveryClient {
    transport: Arc<dyn FloraTransport>,
}

impl std::fmt::Debug for DiscoveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryClient").finish_non_exhaustive()
    }
}

impl DiscoveryClient {
    pub fn new(transport: Arc<dyn FloraTransport>) -> Self {
        Self { transport }
    }

    /// Run one discovery attempt for `address`, bounded by `timeout`.
    ///
    /// Returns the matching device, or `None` if it was not seen, the attempt
    /// timed out, or the transport failed.
    ///
    /// The transport is asked to finish within `timeout`. It is only abandoned
    /// once [`DISCOVERY_GRACE`] has passed on top of that, so a scan that
    /// reports at its own deadline is still used and gets to stop cleanly.
    pub async fn discover(&self, address: &str, timeout: Duration) -> Option<SharedDevice> {
        let address = normalize_address(address);
        let options = DiscoverOptions::new(timeout).address(&address);

        let bound = timeout.saturating_add(DISCOVERY_GRACE);
        let result = match tokio::time::timeout(bound, self.transport.discover(&options)).await {
            Ok(result) => result,
            Err(_) => Err(Error::DeviceNotFound(DeviceNotFoundReason::ScanTimeout {
                duration: timeout,
            })),
        };

        match result {
            Ok(devices) => {
                let seen = devices.len();
                let found = devices
                    .into_iter()
                    .find(|device| normalize_address(device.address()) == address);
                if found.is_none() {
                    debug!(%address, seen, "Discovery attempt missed");
                }
                found
            }
            Err(err) if err.is_discovery_miss() => {
                debug!(%address, %err, "Discovery attempt missed");
                None
            }
            Err(err) => {
                warn!(%address, %err, "Discovery failed");
                None
            }
        }
    }

    /// Run up to `attempts` discovery attempts back to back.
    ///
    /// There is no delay between attempts beyond each attempt's own timeout.
    pub async fn discover_with_retry(
        &self,
        address: &str,
        timeout: Duration,
        attempts: u32,
    ) -> Option<SharedDevice> {
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            info!(
                "Discovery attempt {}/{} for {} ({}s)...",
                attempt,
                attempts,
                address,
                timeout.as_secs()
            );

            if let Some(device) = self.discover(address, timeout).await {
                info!(%address, attempt, "Device found");
                return Some(device);
            }
        }

        warn!(
            "No device found for {} after {} attempts",
            address, attempts
        );
        None
    }
}
