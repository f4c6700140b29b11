//! Background sensor collector.
//!
//! Builds one [`SensorPoller`] per configured sensor, all sharing a single
//! [`RadioArbiter`](flora_core::RadioArbiter) and transport, and runs each on
//! its own task until shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use flora_core::{FloraTransport, SensorPoller};

use crate::config::Config;
use crate::state::AppState;

/// Create the pollers for every configured sensor.
///
/// All pollers share one arbiter, so scans never overlap across sensors.
pub fn build_pollers(
    config: &Config,
    transport: Arc<dyn FloraTransport>,
    host: &str,
) -> Vec<Arc<SensorPoller>> {
    let arbiter = config.radio.arbiter();
    config
        .sensor_configs(host)
        .into_iter()
        .map(|sensor| {
            Arc::new(SensorPoller::new(
                sensor,
                arbiter.clone(),
                Arc::clone(&transport),
            ))
        })
        .collect()
}

/// Background collector that polls sensors on their configured intervals.
pub struct Collector {
    state: Arc<AppState>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Collector {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Start polling all sensors.
    ///
    /// Returns immediately; each sensor is polled on its own task.
    pub fn start(&mut self) {
        if self.state.pollers.is_empty() {
            info!("No sensors configured for collection");
            return;
        }
        if !self.handles.is_empty() {
            warn!("Collector already running");
            return;
        }

        info!("Starting collector for {} sensor(s)", self.state.pollers.len());
        self.handles = self
            .state
            .pollers
            .iter()
            .map(|poller| poller.spawn(self.cancel.child_token()))
            .collect();
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && !self.cancel.is_cancelled()
    }

    /// Token that stops every poller when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop all pollers and wait for them to finish.
    ///
    /// A cycle that is already running is allowed to complete.
    pub async fn stop(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Poller task ended abnormally: {}", e);
            }
        }
        info!("Collector stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use flora_core::{MockDevice, MockTransport};

    use crate::config::{RadioConfig, SensorEntry};

    fn config() -> Config {
        let mut basil = SensorEntry::new("c4:7c:8d:6a:00:01");
        basil.name = "Basil".to_string();
        basil.poll_interval = 60;
        let mut fern = SensorEntry::new("c4:7c:8d:6a:00:02");
        fern.name = "Fern".to_string();
        fern.poll_interval = 60;

        Config {
            radio: RadioConfig {
                cooldown_secs: 5,
                scan_timeout_secs: 10,
                discovery_attempts: 3,
            },
            sensors: vec![basil, fern],
            ..Config::default()
        }
    }

    #[test]
    fn test_build_pollers() {
        let transport: Arc<dyn FloraTransport> = Arc::new(MockTransport::new());
        let pollers = build_pollers(&config(), transport, "greenhouse");

        assert_eq!(pollers.len(), 2);
        assert_eq!(pollers[0].config().name, "Basil");
        assert_eq!(pollers[1].status().info().serial, "greenhouse-Fern");
        assert_eq!(pollers[0].config().scan_timeout, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_polls_until_stopped() {
        let transport = Arc::new(MockTransport::new());
        transport.set_discover_latency(Duration::from_secs(2));
        let basil = transport.add_device(MockDevice::builder().address("c4:7c:8d:6a:00:01").build());
        let fern = transport.add_device(MockDevice::builder().address("c4:7c:8d:6a:00:02").build());

        let config = config();
        let pollers = build_pollers(&config, transport.clone(), "host");
        let state = AppState::new(config, pollers);

        let mut collector = Collector::new(Arc::clone(&state));
        collector.start();
        assert!(collector.is_running());

        tokio::time::sleep(Duration::from_secs(90)).await;
        collector.stop().await;

        assert!(basil.query_count() >= 1);
        assert!(fern.query_count() >= 1);
        assert_eq!(transport.max_in_flight(), 1);
        assert!(state.pollers.iter().all(|p| p.status().active()));
    }

    #[tokio::test]
    async fn test_collector_without_sensors() {
        let state = AppState::new(Config::default(), Vec::new());
        let mut collector = Collector::new(state);
        collector.start();
        assert!(!collector.is_running());
        collector.stop().await;
    }
}
