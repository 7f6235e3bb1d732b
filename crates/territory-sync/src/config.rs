//! Scheduler configuration.

use std::time::Duration;

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between replication passes.
    /// Default: 2s (40 game ticks at 20 TPS).
    pub tick_interval: Duration,

    /// Delay before the first pass after start.
    pub initial_delay: Duration,

    /// Upper bound, in ticks, on the retry delay for a subscriber whose
    /// sends keep failing. `0` retries every tick.
    pub max_backoff_ticks: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            initial_delay: Duration::from_secs(1),
            max_backoff_ticks: 32,
        }
    }
}

impl SyncConfig {
    /// Create a config for tests and local runs: short interval, no delay.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            initial_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Set the tick interval. Zero is raised to one millisecond.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the delay before the first tick.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the backoff cap in ticks.
    #[must_use]
    pub fn with_max_backoff_ticks(mut self, ticks: u64) -> Self {
        self.max_backoff_ticks = ticks;
        self
    }

    /// Disable failure backoff (retry every tick).
    #[must_use]
    pub fn without_backoff(mut self) -> Self {
        self.max_backoff_ticks = 0;
        self
    }
}
