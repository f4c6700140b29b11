//! Per-sensor cache of the discovered device handle.
//!
//! Once a sensor has been discovered its handle is reused by every later
//! poll cycle, so the expensive and unreliable discovery step (and the radio
//! turn it needs) is skipped. The cache belongs to exactly one poller and is
//! only written from that poller's cycle.

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::traits::SharedDevice;

/// Cached handle for one sensor.
#[derive(Debug, Default)]
pub struct DeviceCache {
    handle: RwLock<Option<SharedDevice>>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached handle, if discovery has succeeded before.
    pub async fn get(&self) -> Option<SharedDevice> {
        self.handle.read().await.clone()
    }

    /// Store a freshly discovered handle.
    pub async fn set(&self, device: SharedDevice) {
        debug!(address = device.address(), "Caching device handle");
        *self.handle.write().await = Some(device);
    }

    /// Drop the cached handle so the next cycle rediscovers the device.
    ///
    /// Only used when invalidation after repeated query failures is enabled.
    pub async fn invalidate(&self) {
        if let Some(device) = self.handle.write().await.take() {
            info!(address = device.address(), "Dropped cached device handle");
        }
    }

    pub async fn is_cached(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
