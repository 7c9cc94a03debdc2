use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Past this, the caller should fall back to the full loading state.
    pub timeout_ms: u64,
    /// Busy is never shown for work that completes within this window.
    pub busy_delay_ms: u64,
    /// Once shown, busy stays up at least this long.
    pub busy_min_duration_ms: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self { timeout_ms: 4000, busy_delay_ms: 300, busy_min_duration_ms: 700 }
    }
}

impl TransitionConfig {
    pub fn new(timeout_ms: u64, busy_delay_ms: u64, busy_min_duration_ms: u64) -> Self {
        Self { timeout_ms, busy_delay_ms, busy_min_duration_ms }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn busy_delay(&self) -> Duration {
        Duration::from_millis(self.busy_delay_ms)
    }

    pub fn busy_min_duration(&self) -> Duration {
        Duration::from_millis(self.busy_min_duration_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_delay_ms >= self.timeout_ms {
            return Err(ConfigError::InvalidTransition(format!(
                "busy_delay_ms ({}) must be shorter than timeout_ms ({})",
                self.busy_delay_ms, self.timeout_ms
            )));
        }

        Ok(())
    }
}
