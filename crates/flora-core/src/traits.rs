//! Trait abstractions for the radio transport.
//!
//! The polling engine only needs three capabilities from a transport:
//! discover devices by address, query a discovered device, and disconnect
//! from it. [`FloraTransport`] and [`FloraDevice`] capture that boundary so
//! the engine runs unchanged over btleplug or the in-memory mock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use flora_types::RawReading;

use crate::error::Result;

/// Shared reference to a discovered device.
pub type SharedDevice = Arc<dyn FloraDevice>;

/// Options for a single discovery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverOptions {
    /// Upper bound for the attempt.
    pub timeout: Duration,
    /// Addresses of interest (lowercase). The transport may stop early once
    /// all of them have been seen. Empty means "report everything".
    pub addresses: Vec<String>,
}

impl DiscoverOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            addresses: Vec::new(),
        }
    }

    /// Restrict discovery to one address.
    #[must_use]
    pub fn address(mut self, address: impl AsRef<str>) -> Self {
        self.addresses
            .push(crate::util::normalize_address(address.as_ref()));
        self
    }
}

/// A radio capable of discovering sensors.
///
/// Implementations must not assume they are called concurrently: the engine
/// serializes every call through the radio arbiter.
#[async_trait]
pub trait FloraTransport: Send + Sync {
    /// Run one discovery pass and return every device seen.
    ///
    /// Filtering by address is done by the caller; transports may use
    /// [`DiscoverOptions::addresses`] to finish early.
    async fn discover(&self, options: &DiscoverOptions) -> Result<Vec<SharedDevice>>;
}

/// A discovered sensor that can be queried.
///
/// # Example
///
/// ```ignore
/// use flora_core::{FloraDevice, Result};
///
/// async fn print_moisture(device: &dyn FloraDevice) -> Result<()> {
///     let reading = device.query().await?;
///     println!("Moisture: {}%", reading.sensor.moisture);
///     device.disconnect().await
/// }
/// ```
#[async_trait]
pub trait FloraDevice: Send + Sync + std::fmt::Debug {
    // --- Device Identity ---

    /// Lowercase radio address of the device.
    ///
    /// On macOS this is the peripheral UUID since MAC addresses are not exposed.
    fn address(&self) -> &str;

    // --- Readings ---

    /// Connect if needed and read sensor values, battery and firmware version.
    async fn query(&self) -> Result<RawReading>;

    // --- Connection Management ---

    /// Release the radio link. Safe to call when not connected.
    async fn disconnect(&self) -> Result<()>;
}
