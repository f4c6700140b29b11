//! Process-wide serialization of radio access.
//!
//! Most BLE adapters handle exactly one scan or connection attempt at a time,
//! and overlapping scans from several sensors make discovery fail for all of
//! them. [`RadioArbiter`] hands out [`RadioTurn`]s in strict arrival order and
//! keeps the radio idle for a cool-down after every turn before granting the
//! next one.
//!
//! A turn is released when [`RadioTurn::release`] is called or when the turn
//! is dropped, so early returns and panics inside the critical section cannot
//! leave the radio locked.
//!
//! # Example
//!
//! ```ignore
//! use flora_core::RadioArbiter;
//!
//! let arbiter = RadioArbiter::default();
//! let turn = arbiter.acquire().await;
//! let found = client.discover(address, timeout).await;
//! turn.release();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

/// Default spacing between two radio turns.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);

/// FIFO arbiter for the shared radio.
///
/// Cloning is cheap; all clones share the same queue. Create one per process
/// and hand clones to every poller.
#[derive(Debug, Clone)]
pub struct RadioArbiter {
    inner: Arc<ArbiterInner>,
}

#[derive(Debug)]
struct ArbiterInner {
    // tokio's Mutex grants the lock to waiters in FIFO order.
    radio: Arc<Mutex<()>>,
    cooldown: Duration,
    next_ticket: AtomicU64,
}

impl RadioArbiter {
    /// Create an arbiter with the given post-turn cool-down.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(ArbiterInner {
                radio: Arc::new(Mutex::new(())),
                cooldown,
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    /// The cool-down applied after each turn.
    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    /// Wait for this caller's turn on the radio.
    ///
    /// Turns are granted in the order `acquire` was called. The returned turn
    /// must be kept alive for as long as the radio is in use.
    pub async fn acquire(&self) -> RadioTurn {
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        trace!(ticket, "Waiting for radio turn");

        let guard = Arc::clone(&self.inner.radio).lock_owned().await;

        debug!(ticket, "Radio turn granted");
        RadioTurn {
            guard: Some(guard),
            ticket,
            cooldown: self.inner.cooldown,
        }
    }

    /// Whether a turn is currently held or cooling down.
    pub fn is_busy(&self) -> bool {
        self.inner.radio.try_lock().is_err()
    }
}

impl Default for RadioArbiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// Exclusive right to use the radio.
///
/// Dropping the turn releases it, exactly like calling [`RadioTurn::release`].
/// The next waiter is granted the radio once the cool-down has elapsed; the
/// holder itself is never blocked by the cool-down.
#[must_use = "dropping a RadioTurn releases the radio immediately"]
#[derive(Debug)]
pub struct RadioTurn {
    guard: Option<OwnedMutexGuard<()>>,
    ticket: u64,
    cooldown: Duration,
}

impl RadioTurn {
    /// Sequence number of this turn, for logging.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Hand the radio back.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let ticket = self.ticket;
        let cooldown = self.cooldown;

        if cooldown.is_zero() {
            drop(guard);
            debug!(ticket, "Radio turn released");
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    drop(guard);
                    debug!(ticket, ?cooldown, "Radio turn released after cool-down");
                });
            }
            Err(_) => {
                warn!(
                    ticket,
                    "No tokio runtime available for radio cool-down, releasing immediately"
                );
                drop(guard);
            }
        }
    }
}

impl Drop for RadioTurn {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_turns_granted_in_arrival_order() {
        let arbiter = RadioArbiter::new(Duration::from_secs(1));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = arbiter.acquire().await;

        let mut handles = Vec::new();
        for id in 1..=3 {
            let arbiter = arbiter.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let turn = arbiter.acquire().await;
                order.lock().unwrap().push(id);
                turn.release();
            }));
            // Let the task enqueue before spawning the next one.
            tokio::task::yield_now().await;
        }

        first.release();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_delays_next_turn() {
        let cooldown = Duration::from_secs(15);
        let arbiter = RadioArbiter::new(cooldown);

        let turn = arbiter.acquire().await;
        let released_at = Instant::now();
        turn.release();

        let _next = arbiter.acquire().await;
        assert!(released_at.elapsed() >= cooldown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_does_not_block_holder() {
        let arbiter = RadioArbiter::new(Duration::from_secs(15));

        let turn = arbiter.acquire().await;
        let start = Instant::now();
        turn.release();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(arbiter.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_turn() {
        let arbiter = RadioArbiter::new(Duration::from_secs(5));

        {
            let _turn = arbiter.acquire().await;
        }

        let next = timeout(Duration::from_secs(6), arbiter.acquire()).await;
        assert!(next.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_while_holding_turn_releases_it() {
        let arbiter = RadioArbiter::new(Duration::from_secs(5));

        let holder = arbiter.clone();
        let result = tokio::spawn(async move {
            let _turn = holder.acquire().await;
            panic!("discovery blew up");
        })
        .await;
        assert!(result.is_err());

        let next = timeout(Duration::from_secs(6), arbiter.acquire()).await;
        assert!(next.is_ok(), "turn must be released after a panic");
    }

    #[tokio::test]
    async fn test_zero_cooldown_releases_immediately() {
        let arbiter = RadioArbiter::new(Duration::ZERO);

        let turn = arbiter.acquire().await;
        assert!(arbiter.is_busy());
        turn.release();
        assert!(!arbiter.is_busy());
    }

    #[tokio::test]
    async fn test_tickets_increase() {
        let arbiter = RadioArbiter::new(Duration::ZERO);

        let a = arbiter.acquire().await;
        let first = a.ticket();
        a.release();
        let b = arbiter.acquire().await;

        assert!(b.ticket() > first);
    }

    #[test]
    fn test_default_cooldown() {
        assert_eq!(RadioArbiter::default().cooldown(), DEFAULT_COOLDOWN);
        assert_eq!(DEFAULT_COOLDOWN, Duration::from_secs(15));
    }
}
