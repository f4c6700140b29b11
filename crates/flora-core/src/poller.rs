//! Per-sensor poll scheduler.
//!
//! A [`SensorPoller`] owns everything private to one sensor: its cached device
//! handle, its snapshot writer and its failure bookkeeping. Each cycle walks
//! the state machine
//!
//! ```text
//! Idle → Scanning → Querying → Updating → Idle
//!            └────→ Skipped
//! ```
//!
//! Scanning is skipped entirely once a device handle is cached. The radio turn
//! is held for discovery only; the query, the snapshot update and the
//! disconnect run outside it. No error escapes a cycle, and a panic inside a
//! cycle is caught by [`SensorPoller::run`] so the loop keeps going.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::arbiter::RadioArbiter;
use crate::cache::DeviceCache;
use crate::config::{SensorConfig, clamp_poll_interval};
use crate::discovery::DiscoveryClient;
use crate::snapshot::SnapshotEngine;
use crate::status::SensorStatus;
use crate::thresholds::Thresholds;
use crate::traits::{FloraTransport, SharedDevice};

/// Consecutive failures reported at `warn` before going quiet.
const LOUD_FAILURES: u32 = 3;

/// Where a sensor's poll cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PollState {
    Idle = 0,
    /// Holding a radio turn and discovering the device.
    Scanning = 1,
    Querying = 2,
    Updating = 3,
    /// The last cycle found no device. Stays until the next cycle starts.
    Skipped = 4,
}

impl From<u8> for PollState {
    fn from(value: u8) -> Self {
        match value {
            1 => PollState::Scanning,
            2 => PollState::Querying,
            3 => PollState::Updating,
            4 => PollState::Skipped,
            _ => PollState::Idle,
        }
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    /// A reading was taken and published.
    Updated,
    /// No device was found after exhausting the discovery attempts.
    Skipped,
    /// The device was found but the query failed; the snapshot is unchanged.
    QueryFailed,
}

/// Counters describing a poller's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub cycles: u64,
    pub updates: u64,
    pub skips: u64,
    pub query_failures: u64,
    /// Cycles that panicked and were recovered.
    pub panics: u64,
    /// Failed cycles since the last successful one.
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    updates: AtomicU64,
    skips: AtomicU64,
    query_failures: AtomicU64,
    panics: AtomicU64,
    consecutive_failures: AtomicU32,
    consecutive_query_failures: AtomicU32,
}

/// Polls one sensor on its configured interval.
pub struct SensorPoller {
    config: SensorConfig,
    arbiter: RadioArbiter,
    discovery: DiscoveryClient,
    cache: DeviceCache,
    engine: SnapshotEngine,
    status: SensorStatus,
    state: AtomicU8,
    counters: Counters,
}

impl std::fmt::Debug for SensorPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorPoller")
            .field("name", &self.config.name)
            .field("address", &self.config.address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SensorPoller {
    /// Create a poller sharing `arbiter` and `transport` with the other
    /// sensors of the process.
    pub fn new(
        config: SensorConfig,
        arbiter: RadioArbiter,
        transport: Arc<dyn FloraTransport>,
    ) -> Self {
        let engine = SnapshotEngine::new(Thresholds::new(config.thresholds.clone()));
        let status = SensorStatus::new(&config, engine.subscribe());

        Self {
            discovery: DiscoveryClient::new(transport),
            cache: DeviceCache::new(),
            config,
            arbiter,
            engine,
            status,
            state: AtomicU8::new(PollState::Idle as u8),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Read-only view of this sensor for the host.
    pub fn status(&self) -> SensorStatus {
        self.status.clone()
    }

    pub fn state(&self) -> PollState {
        PollState::from(self.state.load(Ordering::Acquire))
    }

    /// Whether a device handle is cached.
    pub async fn is_cached(&self) -> bool {
        self.cache.is_cached().await
    }

    pub fn stats(&self) -> PollStats {
        let c = &self.counters;
        PollStats {
            cycles: c.cycles.load(Ordering::Relaxed),
            updates: c.updates.load(Ordering::Relaxed),
            skips: c.skips.load(Ordering::Relaxed),
            query_failures: c.query_failures.load(Ordering::Relaxed),
            panics: c.panics.load(Ordering::Relaxed),
            consecutive_failures: c.consecutive_failures.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, state: PollState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run exactly one poll cycle.
    #[tracing::instrument(level = "debug", skip_all, fields(sensor = %self.config.name, address = %self.config.address))]
    pub async fn poll_once(&self) -> PollOutcome {
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);

        let device = match self.cache.get().await {
            Some(device) => {
                debug!("Using cached device handle");
                device
            }
            None => match self.scan().await {
                Some(device) => device,
                None => {
                    self.set_state(PollState::Skipped);
                    self.counters.skips.fetch_add(1, Ordering::Relaxed);
                    self.record_failure("no device found");
                    return PollOutcome::Skipped;
                }
            },
        };

        self.set_state(PollState::Querying);
        let reading = match device.query().await {
            Ok(reading) => reading,
            Err(err) => {
                self.counters.query_failures.fetch_add(1, Ordering::Relaxed);
                self.record_failure(&format!("query failed: {err}"));
                self.maybe_invalidate().await;
                self.set_state(PollState::Idle);
                return PollOutcome::QueryFailed;
            }
        };

        self.set_state(PollState::Updating);
        self.engine.update(reading);

        if let Err(err) = device.disconnect().await {
            warn!(%err, "Failed to disconnect after query");
        }

        self.counters.updates.fetch_add(1, Ordering::Relaxed);
        self.counters
            .consecutive_query_failures
            .store(0, Ordering::Relaxed);
        let previous = self
            .counters
            .consecutive_failures
            .swap(0, Ordering::Relaxed);
        if previous > 0 {
            info!(
                "Sensor {} recovered after {} failed cycles",
                self.config.name, previous
            );
        }

        self.set_state(PollState::Idle);
        PollOutcome::Updated
    }

    /// Discover the device while holding a radio turn and cache it if found.
    async fn scan(&self) -> Option<SharedDevice> {
        self.set_state(PollState::Scanning);

        let turn = self.arbiter.acquire().await;
        debug!(ticket = turn.ticket(), "Scanning for device");
        let found = self
            .discovery
            .discover_with_retry(
                &self.config.address,
                self.config.scan_timeout,
                self.config.discovery_attempts,
            )
            .await;
        turn.release();

        if let Some(device) = &found {
            self.cache.set(Arc::clone(device)).await;
        }
        found
    }

    fn record_failure(&self, reason: &str) {
        let failures = self
            .counters
            .consecutive_failures
            .fetch_add(1, Ordering::Relaxed)
            + 1;

        if failures <= LOUD_FAILURES {
            warn!(
                "Failed to poll {}: {} (attempt {})",
                self.config.name, reason, failures
            );
        } else if failures == LOUD_FAILURES + 1 {
            error!(
                "Failed to poll {} after {} attempts, will continue trying silently",
                self.config.name, failures
            );
        } else {
            debug!("Failed to poll {}: {}", self.config.name, reason);
        }
    }

    async fn maybe_invalidate(&self) {
        let failures = self
            .counters
            .consecutive_query_failures
            .fetch_add(1, Ordering::Relaxed)
            + 1;

        if let Some(limit) = self.config.invalidate_after_failures
            && failures >= limit
        {
            info!(
                "Dropping cached handle for {} after {} failed queries",
                self.config.name, failures
            );
            self.cache.invalidate().await;
            self.counters
                .consecutive_query_failures
                .store(0, Ordering::Relaxed);
        }
    }

    /// Poll forever on the configured interval until `cancel` fires.
    ///
    /// The first cycle starts immediately. Ticks that come due while a cycle
    /// is still running are dropped rather than queued. Cancellation is only
    /// observed between cycles.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let period = clamp_poll_interval(self.config.poll_interval);
        info!(
            "Starting poller for {} ({}, interval: {}s)",
            self.config.name,
            self.config.address,
            period.as_secs()
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let cycle = AssertUnwindSafe(self.poll_once()).catch_unwind().await;
            if let Err(panic) = cycle {
                self.counters.panics.fetch_add(1, Ordering::Relaxed);
                self.set_state(PollState::Idle);
                error!(
                    "Poll cycle for {} panicked: {}",
                    self.config.name,
                    panic_message(panic.as_ref())
                );
            }
        }

        info!("Poller for {} stopped", self.config.name);
    }

    /// Spawn [`SensorPoller::run`] on the current runtime.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(cancel))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
