//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Gap above which a full snapshot replaces incremental catch-up.
    pub snapshot_threshold: i64,
    /// Maximum number of updates requested per difference round.
    pub difference_batch_size: i32,
    /// Consecutive difference rounds without progress before giving up.
    pub max_idle_difference_rounds: u32,
    /// Page size when listing dialogs during a snapshot.
    pub dialog_page_size: i32,
    /// Interval of the watchdog.
    pub watchdog_interval: Duration,
    /// Timeout of blocking requests.
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            snapshot_threshold: 10_000,
            difference_batch_size: 100,
            max_idle_difference_rounds: 10,
            dialog_page_size: 100,
            watchdog_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the snapshot threshold.
    pub fn with_snapshot_threshold(mut self, threshold: i64) -> Self {
        self.snapshot_threshold = threshold;
        self
    }

    /// Sets the difference batch size.
    pub fn with_difference_batch_size(mut self, size: i32) -> Self {
        self.difference_batch_size = size;
        self
    }

    /// Sets the number of idle difference rounds tolerated.
    pub fn with_max_idle_difference_rounds(mut self, rounds: u32) -> Self {
        self.max_idle_difference_rounds = rounds;
        self
    }

    /// Sets the dialog page size.
    pub fn with_dialog_page_size(mut self, size: i32) -> Self {
        self.dialog_page_size = size;
        self
    }

    /// Sets the watchdog interval.
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
