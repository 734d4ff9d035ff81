//! Per-task execution monitor.
//!
//! A [`JobMonitor`] owns two things: the in-flight counter that acts as a
//! single-flight gate, and the ticker task that fires the tick handler on
//! interval boundaries.
//!
//! ```text
//!   Idle ──start──► Armed ──tick admitted──► Executing
//!    │                ▲                          │
//!    │                └──────── end() ───────────┘
//!    ├──────── begin_stopping (any state) ─────► Stopping
//!    └──────────── dispose (any state) ────────► Disposed
//! ```
//!
//! The gate never blocks: a tick that finds another execution in flight
//! backs out and is dropped.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::warn;

/// Observable state of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Created, timer not started.
    Idle,
    /// Timer running, nothing in flight.
    Armed,
    /// Timer running, an execution holds the slot.
    Executing,
    /// Host is stopping; waiting for the in-flight execution to drain.
    Stopping,
    /// Timer released. Terminal.
    Disposed,
}

#[derive(Debug, Default)]
pub struct JobMonitor {
    entered: AtomicUsize,
    stopping: AtomicBool,
    disposed: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl JobMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the in-flight counter and return the new value.
    ///
    /// A result of exactly 1 means the caller owns the execution slot. Any
    /// other value means it must call [`end`](Self::end) and skip.
    pub fn increment(&self) -> usize {
        self.entered.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Release one [`increment`](Self::increment).
    pub fn end(&self) {
        let previous = self
            .entered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous.is_err() {
            warn!("end() called on an idle monitor; ignoring");
        }
    }

    pub fn is_running(&self) -> bool {
        self.entered.load(Ordering::Acquire) > 0
    }

    /// Gate the caller through the single-flight slot.
    ///
    /// Returns a guard that calls [`end`](Self::end) when dropped, or `None`
    /// if another execution is already in flight.
    pub fn try_enter(self: &Arc<Self>) -> Option<ExecutionSlot> {
        let slot = ExecutionSlot {
            monitor: Arc::clone(self),
        };
        if self.increment() == 1 {
            Some(slot)
        } else {
            // dropping the slot balances the increment
            None
        }
    }

    pub fn is_started(&self) -> bool {
        self.ticker_guard().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Mark the monitor as draining. Reported by [`state`](Self::state)
    /// until [`dispose`](Self::dispose).
    pub fn begin_stopping(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    pub fn state(&self) -> MonitorState {
        if self.is_disposed() {
            MonitorState::Disposed
        } else if self.stopping.load(Ordering::Acquire) {
            MonitorState::Stopping
        } else if !self.is_started() {
            MonitorState::Idle
        } else if self.is_running() {
            MonitorState::Executing
        } else {
            MonitorState::Armed
        }
    }

    /// Start firing `tick` every `interval`, first at the next wall-clock
    /// boundary that is a multiple of `interval`.
    ///
    /// Must be called from within a tokio runtime. Starting an already armed
    /// or disposed monitor is ignored.
    pub fn start<F>(&self, tick: F, interval: Duration)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut ticker = self.ticker_guard();
        if self.is_disposed() {
            warn!("start() called on a disposed monitor; ignoring");
            return;
        }
        if ticker.is_some() {
            warn!("start() called on an armed monitor; ignoring");
            return;
        }

        let first = Instant::now() + time_until_next(Utc::now(), interval);
        *ticker = Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(first, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                tick();
            }
        }));
    }

    /// Stop future firings. Does not wait for an execution in flight.
    pub fn dispose(&self) {
        let mut ticker = self.ticker_guard();
        self.disposed.store(true, Ordering::Release);
        if let Some(handle) = ticker.take() {
            handle.abort();
        }
    }

    fn ticker_guard(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for JobMonitor {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Ownership of a monitor's execution slot. Dropping it calls
/// [`JobMonitor::end`], so every exit path releases the slot.
#[derive(Debug)]
pub struct ExecutionSlot {
    monitor: Arc<JobMonitor>,
}

impl Drop for ExecutionSlot {
    fn drop(&mut self) {
        self.monitor.end();
    }
}

/// Time from `now` until the next instant that is a whole multiple of
/// `interval` since the Unix epoch. Zero when `now` sits exactly on a
/// boundary.
pub fn time_until_next(now: DateTime<Utc>, interval: Duration) -> Duration {
    let step = interval.as_nanos();
    if step == 0 {
        return Duration::ZERO;
    }

    let seconds = u128::try_from(now.timestamp()).unwrap_or(0);
    let since_epoch = seconds * 1_000_000_000 + u128::from(now.timestamp_subsec_nanos());
    let remainder = since_epoch % step;
    if remainder == 0 {
        return Duration::ZERO;
    }

    let wait = step - remainder;
    Duration::new(
        (wait / 1_000_000_000) as u64,
        (wait % 1_000_000_000) as u32,
    )
}
