//! Periodic sync timer.
//!
//! The scheduler owns one cancellable repeating timer and the online flag.
//! Each tick is handed to its own task, so stopping the timer never cancels a
//! cycle that is already running. Ticks are skipped while offline; coming
//! back online triggers one immediate queue drain on top of the normal
//! cadence.
//!
//! `start` and `set_interval` spawn the timer task and must be called from
//! within a tokio runtime. `set_online` outside a runtime only records the
//! flag; the reconnect drain is skipped with a warning.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::ValidationError;

pub const MIN_INTERVAL_MS: u64 = 10_000;
pub const MAX_INTERVAL_MS: u64 = 300_000;
pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// Work the scheduler triggers. Called once per event; the returned future
/// runs as its own task.
pub type Callback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Checks that an interval lies within the accepted bounds.
pub fn validate_interval(interval_ms: u64) -> Result<Duration, ValidationError> {
    if (MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
        Ok(Duration::from_millis(interval_ms))
    } else {
        Err(ValidationError::IntervalOutOfRange(interval_ms))
    }
}

struct Timer {
    state: SchedulerState,
    interval_ms: u64,
    handle: Option<JoinHandle<()>>,
}

pub struct SyncScheduler {
    timer: Mutex<Timer>,
    online: Arc<AtomicBool>,
    on_tick: Callback,
    on_reconnect: Callback,
}

impl SyncScheduler {
    /// Creates a stopped scheduler. An out-of-range `interval_ms` falls back
    /// to [`DEFAULT_INTERVAL_MS`].
    pub fn new(interval_ms: u64, online: bool, on_tick: Callback, on_reconnect: Callback) -> Self {
        let interval_ms = match validate_interval(interval_ms) {
            Ok(_) => interval_ms,
            Err(e) => {
                tracing::warn!("{}; using {} ms", e, DEFAULT_INTERVAL_MS);
                DEFAULT_INTERVAL_MS
            }
        };

        Self {
            timer: Mutex::new(Timer {
                state: SchedulerState::Stopped,
                interval_ms,
                handle: None,
            }),
            online: Arc::new(AtomicBool::new(online)),
            on_tick,
            on_reconnect,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Timer> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    pub fn interval_ms(&self) -> u64 {
        self.lock().interval_ms
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Starts ticking every `interval_ms`, replacing any running timer.
    ///
    /// The first tick fires one interval after the call. An invalid interval
    /// is rejected and leaves the scheduler exactly as it was.
    pub fn start(&self, interval_ms: u64) -> Result<(), ValidationError> {
        let period = validate_interval(interval_ms)?;
        let mut timer = self.lock();

        if let Some(handle) = timer.handle.take() {
            handle.abort();
        }

        timer.handle = Some(self.spawn_timer(period));
        timer.interval_ms = interval_ms;
        timer.state = SchedulerState::Running;
        tracing::info!("Auto-sync every {} s", period.as_secs());
        Ok(())
    }

    /// Cancels the timer. Calling it while stopped does nothing.
    pub fn stop(&self) {
        let mut timer = self.lock();
        if let Some(handle) = timer.handle.take() {
            handle.abort();
            tracing::info!("Auto-sync stopped");
        }
        timer.state = SchedulerState::Stopped;
    }

    /// Changes the cadence. A running timer restarts at the new interval.
    pub fn set_interval(&self, interval_ms: u64) -> Result<(), ValidationError> {
        validate_interval(interval_ms)?;
        if self.state() == SchedulerState::Running {
            self.start(interval_ms)
        } else {
            self.lock().interval_ms = interval_ms;
            Ok(())
        }
    }

    /// Records connectivity. Returns true when this call was an
    /// offline-to-online transition, which triggers one immediate drain.
    pub fn set_online(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        let reconnected = online && !was_online;

        if reconnected {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    tracing::info!("Back online; draining offline queue");
                    handle.spawn((self.on_reconnect)());
                }
                Err(_) => tracing::warn!("Back online outside a runtime; not draining"),
            }
        } else if was_online && !online {
            tracing::info!("Gone offline");
        }

        reconnected
    }

    fn spawn_timer(&self, period: Duration) -> JoinHandle<()> {
        let on_tick = self.on_tick.clone();
        let online = self.online.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !online.load(Ordering::SeqCst) {
                    tracing::debug!("Offline; skipping scheduled sync");
                    continue;
                }
                tokio::spawn(on_tick());
            }
        })
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.lock().handle.take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("state", &self.state())
            .field("interval_ms", &self.interval_ms())
            .field("online", &self.is_online())
            .finish()
    }
}
