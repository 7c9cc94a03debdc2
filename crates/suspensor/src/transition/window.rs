use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::TransitionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub(crate) u64);

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transition_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPhase {
    Idle,
    WaitingForDelay,
    Busy,
    Cooling,
}

impl fmt::Display for BusyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyPhase::Idle => write!(f, "idle"),
            BusyPhase::WaitingForDelay => write!(f, "waiting"),
            BusyPhase::Busy => write!(f, "busy"),
            BusyPhase::Cooling => write!(f, "cooling"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionStatus {
    pub phase: BusyPhase,
    /// Show the lightweight busy indicator.
    pub is_busy: bool,
    /// Work ran past `timeout_ms`; show the full loading state instead.
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl TransitionStatus {
    pub fn idle() -> Self {
        Self { phase: BusyPhase::Idle, is_busy: false, timed_out: false, elapsed_ms: 0 }
    }
}

/// Timing of one transition, evaluated against any instant.
#[derive(Debug, Clone)]
pub struct TransitionWindow {
    id: TransitionId,
    started_at: Instant,
    config: TransitionConfig,
    completed_at: Option<Instant>,
}

impl TransitionWindow {
    pub fn new(id: TransitionId, started_at: Instant, config: TransitionConfig) -> Self {
        Self { id, started_at, config, completed_at: None }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    pub fn completed_at(&self) -> Option<Instant> {
        self.completed_at
    }

    /// Records completion. The first call wins.
    pub fn complete_at(&mut self, at: Instant) {
        if self.completed_at.is_none() {
            self.completed_at = Some(at.max(self.started_at));
        }
    }

    fn busy_from(&self) -> Instant {
        self.started_at + self.config.busy_delay()
    }

    fn busy_until(&self) -> Instant {
        self.busy_from() + self.config.busy_min_duration()
    }

    fn timeout_at(&self) -> Instant {
        self.started_at + self.config.timeout()
    }

    pub fn status_at(&self, now: Instant) -> TransitionStatus {
        let now = now.max(self.started_at);
        let busy_from = self.busy_from();
        let completed = self.completed_at.filter(|done| *done <= now);

        let phase = match completed {
            Some(done) if done <= busy_from => BusyPhase::Idle,
            Some(_) if now < self.busy_until() => BusyPhase::Cooling,
            Some(_) => BusyPhase::Idle,
            None if now < busy_from => BusyPhase::WaitingForDelay,
            None => BusyPhase::Busy,
        };

        let timed_out = completed.is_none() && now >= self.timeout_at();
        let is_busy = matches!(phase, BusyPhase::Busy | BusyPhase::Cooling) && !timed_out;

        TransitionStatus {
            phase,
            is_busy,
            timed_out,
            elapsed_ms: u64::try_from((now - self.started_at).as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Time from `now` until `status_at` can next change on its own, or
    /// `None` when only completion can move it.
    pub fn next_change_after(&self, now: Instant) -> Option<Duration> {
        let now = now.max(self.started_at);
        let status = self.status_at(now);

        let next = match status.phase {
            BusyPhase::Idle => None,
            BusyPhase::WaitingForDelay => Some(self.busy_from()),
            BusyPhase::Cooling => Some(self.busy_until()),
            BusyPhase::Busy if status.timed_out => None,
            BusyPhase::Busy => Some(self.timeout_at()),
        };

        next.map(|at| at.saturating_duration_since(now))
    }
}
