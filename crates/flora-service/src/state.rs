//! Application state shared across handlers.
//!
//! The state holds one [`SensorPoller`] per configured sensor. Handlers only
//! read the pollers' published snapshots and counters, so no locks are taken
//! on the request path.

use std::sync::Arc;

use time::OffsetDateTime;

use flora_core::SensorPoller;

use crate::config::Config;

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// Configuration the service was started with.
    pub config: Config,
    /// Pollers in configuration order.
    pub pollers: Vec<Arc<SensorPoller>>,
    /// When the service started.
    pub started_at: OffsetDateTime,
}

impl AppState {
    pub fn new(config: Config, pollers: Vec<Arc<SensorPoller>>) -> Arc<Self> {
        Arc::new(Self {
            config,
            pollers,
            started_at: OffsetDateTime::now_utc(),
        })
    }

    /// Find a poller by sensor name, falling back to its address.
    pub fn poller(&self, id: &str) -> Option<&Arc<SensorPoller>> {
        let address = flora_core::util::normalize_address(id);
        self.pollers
            .iter()
            .find(|poller| poller.config().name == id)
            .or_else(|| {
                self.pollers
                    .iter()
                    .find(|poller| poller.config().address == address)
            })
    }

    /// Seconds since the service started.
    pub fn uptime_secs(&self) -> i64 {
        (OffsetDateTime::now_utc() - self.started_at).whole_seconds()
    }
}
