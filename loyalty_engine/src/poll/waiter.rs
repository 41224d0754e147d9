//! Cooperative timing primitives shared by the engine's long-running loops.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::watch;

/// How often [`CancelWaiter::wait_tick`] re-checks the clock and the shutdown flag.
const POLL_GRANULARITY: std::time::Duration = std::time::Duration::from_millis(50);

//--------------------------------------     SharedTime     ----------------------------------------------------------

/// A wall-clock instant shared between tasks.
///
/// Also used standalone for the pool's `last_rescue_scan` stamp, where the rescue scanner is the
/// only writer and every worker reads.
#[derive(Debug)]
pub struct SharedTime {
    inner: RwLock<DateTime<Utc>>,
}

impl SharedTime {
    pub fn new(t: DateTime<Utc>) -> Self {
        Self { inner: RwLock::new(t) }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn get(&self) -> DateTime<Utc> {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = t;
    }

    /// Move the instant forward to `t`; a `t` in the past of the current value is ignored.
    pub fn advance_to(&self, t: DateTime<Utc>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if t > *guard {
            *guard = t;
        }
    }
}

//--------------------------------------    CancelWaiter    ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the shutdown signal fired")]
pub struct Cancelled;

/// A cancellation-aware timer with a movable deadline.
///
/// [`wait_tick`](Self::wait_tick) blocks until either the shutdown flag flips (returning
/// `Err(Cancelled)`) or the wall clock reaches the internal `wait_until` marker. When the waiter
/// was built with a non-zero `interval`, a successful tick advances the marker by one period.
///
/// [`delay_until`](Self::delay_until) pushes the marker forward. One waiter instance is shared by
/// the whole poll worker pool, so a single `delay_until` call - say, from the worker that just saw
/// an HTTP 429 - pauses every worker at its next tick without any per-worker coordination.
pub struct CancelWaiter {
    shutdown: watch::Receiver<bool>,
    interval: Duration,
    wait_until: SharedTime,
}

impl CancelWaiter {
    /// `interval` of zero means the waiter has no period: ticks fire as soon as no delay is in
    /// force.
    pub fn new(shutdown: watch::Receiver<bool>, interval: Duration) -> Self {
        Self { shutdown, interval, wait_until: SharedTime::now() }
    }

    pub async fn wait_tick(&self) -> Result<(), Cancelled> {
        loop {
            if *self.shutdown.borrow() {
                return Err(Cancelled);
            }
            let until = self.wait_until.get();
            if until <= Utc::now() {
                if self.interval > Duration::zero() {
                    self.wait_until.set(until + self.interval);
                }
                return Ok(());
            }
            tokio::time::sleep(POLL_GRANULARITY).await;
        }
    }

    /// Hold the next tick back until at least `t`. Never moves the deadline backwards.
    pub fn delay_until(&self, t: DateTime<Utc>) {
        self.wait_until.advance_to(t);
    }
}
