//! Busy-indicator timing for state changes that may suspend.
//!
//! A transition shows nothing for work that finishes within
//! `busy_delay_ms`, holds the busy indicator for at least
//! `busy_min_duration_ms` once it appears, and flags `timed_out` after
//! `timeout_ms` so the caller can switch to its full loading state. Timing is
//! read from an injected [`Clock`].

mod config;
mod window;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clock::{Clock, TokioClock};
use crate::readiness::Readiness;
use crate::resource::{SignalState, Suspension};

pub use config::TransitionConfig;
pub use window::{BusyPhase, TransitionId, TransitionStatus, TransitionWindow};

struct Tracked {
    window: TransitionWindow,
    work: Option<Box<dyn Readiness>>,
}

impl Tracked {
    /// Stamps completion at `now` if the work has settled. Settle listeners
    /// normally stamp first, at the settle instant; this covers readiness
    /// that exposes no suspensions.
    fn refresh(&mut self, now: Instant) {
        if self.window.completed_at().is_some() {
            return;
        }

        let settled = self.work.as_ref().is_some_and(|work| work.ready_state().is_settled());
        if settled {
            self.window.complete_at(now);
            self.work = None;
            debug!(
                "{} completed after {}ms",
                self.window.id(),
                now.saturating_duration_since(self.window.started_at()).as_millis()
            );
        }
    }

    fn status(&mut self, now: Instant) -> TransitionStatus {
        self.refresh(now);
        self.window.status_at(now)
    }
}

/// Registers a listener on every suspension the work is waiting on, so
/// completion is stamped on `clock` when the last of them settles rather
/// than when the status is next read.
fn watch_settlement(tracked: &Arc<Mutex<Tracked>>, clock: &Arc<dyn Clock>) {
    let pending = {
        let guard = tracked.lock();
        guard.work.as_ref().map(|work| work.pending_suspensions()).unwrap_or_default()
    };

    for suspension in pending {
        let tracked: Weak<Mutex<Tracked>> = Arc::downgrade(tracked);
        let clock = Arc::clone(clock);
        suspension.on_settle(move |state| {
            if state != SignalState::Settled {
                return;
            }
            if let Some(tracked) = tracked.upgrade() {
                let now = clock.now();
                tracked.lock().refresh(now);
            }
        });
    }
}

pub struct TransitionScheduler {
    clock: Arc<dyn Clock>,
    config: TransitionConfig,
    current: Mutex<Option<Arc<Mutex<Tracked>>>>,
    latest: Arc<AtomicU64>,
    next_id: AtomicU64,
}

impl TransitionScheduler {
    pub fn new(config: TransitionConfig) -> Self {
        Self::with_clock(config, TokioClock)
    }

    pub fn with_clock(config: TransitionConfig, clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            config,
            current: Mutex::new(None),
            latest: Arc::new(AtomicU64::new(0)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    pub fn start_transition<F, R>(&self, action: F) -> TransitionHandle
    where
        F: FnOnce() -> R,
        R: Readiness + 'static,
    {
        self.start_transition_with(self.config, action)
    }

    /// Starts timing, invokes `action`, and tracks the readiness it returns.
    ///
    /// The new transition supersedes any earlier one for display purposes.
    /// Earlier work is not cancelled.
    pub fn start_transition_with<F, R>(
        &self,
        config: TransitionConfig,
        action: F,
    ) -> TransitionHandle
    where
        F: FnOnce() -> R,
        R: Readiness + 'static,
    {
        if let Err(e) = config.validate() {
            warn!("Starting transition with questionable thresholds: {}", e);
        }

        let id = TransitionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let started_at = self.clock.now();
        let work = action();

        let mut tracked = Tracked {
            window: TransitionWindow::new(id, started_at, config),
            work: Some(Box::new(work)),
        };
        tracked.refresh(self.clock.now());

        let tracked = Arc::new(Mutex::new(tracked));
        watch_settlement(&tracked, &self.clock);
        let previous = self.current.lock().replace(Arc::clone(&tracked));
        self.latest.store(id.0, Ordering::SeqCst);

        if let Some(previous) = previous {
            debug!("{} superseded by {}", previous.lock().window.id(), id);
        }
        debug!(
            "Started {} (delay {}ms, min busy {}ms, timeout {}ms)",
            id, config.busy_delay_ms, config.busy_min_duration_ms, config.timeout_ms
        );

        TransitionHandle {
            id,
            tracked,
            clock: Arc::clone(&self.clock),
            latest: Arc::clone(&self.latest),
        }
    }

    fn current(&self) -> Option<Arc<Mutex<Tracked>>> {
        self.current.lock().as_ref().map(Arc::clone)
    }

    pub fn current_id(&self) -> Option<TransitionId> {
        let tracked = self.current()?;
        let id = tracked.lock().window.id();
        Some(id)
    }

    /// Status of the most recently started transition.
    pub fn status(&self) -> TransitionStatus {
        let Some(tracked) = self.current() else {
            return TransitionStatus::idle();
        };
        let now = self.clock.now();
        tracked.lock().status(now)
    }

    pub fn is_busy(&self) -> bool {
        self.status().is_busy
    }

    pub fn is_timed_out(&self) -> bool {
        self.status().timed_out
    }

    /// How long a poll loop may sleep before the status changes on its own.
    pub fn next_change(&self) -> Option<Duration> {
        let tracked = self.current()?;
        let now = self.clock.now();
        let mut tracked = tracked.lock();
        tracked.refresh(now);
        tracked.window.next_change_after(now)
    }

    /// Suspensions the current transition's work is still waiting on.
    pub fn pending_suspensions(&self) -> Vec<Suspension> {
        let Some(tracked) = self.current() else {
            return Vec::new();
        };
        let tracked = tracked.lock();
        tracked.work.as_ref().map(|work| work.pending_suspensions()).unwrap_or_default()
    }
}

/// One started transition. Outlives supersession; its own status stays
/// available even when it is no longer the one on display.
pub struct TransitionHandle {
    id: TransitionId,
    tracked: Arc<Mutex<Tracked>>,
    clock: Arc<dyn Clock>,
    latest: Arc<AtomicU64>,
}

impl TransitionHandle {
    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id.0
    }

    /// Marks the work complete now, for actions whose completion is not
    /// observable through the returned readiness.
    pub fn complete(&self) {
        let now = self.clock.now();
        let mut tracked = self.tracked.lock();
        tracked.window.complete_at(now);
        tracked.work = None;
    }

    pub fn status(&self) -> TransitionStatus {
        let now = self.clock.now();
        self.tracked.lock().status(now)
    }

    pub fn window(&self) -> TransitionWindow {
        self.tracked.lock().window.clone()
    }
}
