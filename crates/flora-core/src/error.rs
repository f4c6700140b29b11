//! Error types for flora-core.
//!
//! This module defines the errors that can occur while discovering and
//! querying Mi Flora sensors over Bluetooth Low Energy.
//!
//! # How the poller treats errors
//!
//! No error ever escapes a poll cycle. Each one is logged and the cycle ends,
//! leaving the last published snapshot untouched.
//!
//! | Stage | Error | Outcome for the cycle |
//! |-------|-------|-----------------------|
//! | Discovery | [`Error::Timeout`] | Counts as a miss, retried up to the configured attempts |
//! | Discovery | [`Error::Bluetooth`], [`Error::DeviceNotFound`] | Counts as a miss, cached handle untouched |
//! | Query | any | Cycle abandoned, stale snapshot preserved |
//! | Disconnect | any | Logged at `warn`, never rethrown |
//!
//! ## Recommended Timeouts
//!
//! | Operation | Recommended Timeout | Notes |
//! |-----------|---------------------|-------|
//! | Discovery | 10-30 seconds | Mi Flora advertises roughly every 3s but misses are common |
//! | Connection | 10-15 seconds | Coin-cell devices are slow to accept |
//! | Characteristic read | 5 seconds | Usually completes well under 1s |

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to Mi Flora devices.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during discovery.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Failed to parse a characteristic payload.
    #[error("Parse error: {0}")]
    Parse(#[from] flora_types::ParseError),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Connection to the device failed.
    #[error("Connection to {address} failed: {reason}")]
    ConnectionFailed {
        /// The device address.
        address: String,
        /// Why the connection failed.
        reason: String,
    },

    /// Connected, but the query itself failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// Device with the specified address was not seen.
    NotFound { address: String },
    /// Discovery timed out before the device advertised.
    ScanTimeout { duration: Duration },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { address } => write!(f, "device '{}' not found", address),
            Self::ScanTimeout { duration } => write!(f, "scan timed out after {:?}", duration),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific address.
    pub fn device_not_found(address: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            address: address.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a connection failure.
    pub fn connection_failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from a discovery step that simply missed the
    /// device, as opposed to a radio stack failure.
    pub fn is_discovery_miss(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::DeviceNotFound(DeviceNotFoundReason::NotFound { .. })
                | Self::DeviceNotFound(DeviceNotFoundReason::ScanTimeout { .. })
        )
    }
}

/// Result type alias using flora-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
