//! Configuration for the sync engine.

use std::time::Duration;

/// Quiet period after the last local edit before a note is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// How inbound snapshots are applied to the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Merge per note by `updated_at`, keeping newer unsynced local edits.
    #[default]
    Merge,
    /// Replace the local collection with every non-empty snapshot.
    ///
    /// Unsynced local edits can be lost.
    Replace,
}

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period before a scheduled write fires.
    pub debounce: Duration,
    /// Retry configuration for failed writes and deletes.
    pub retry: RetryConfig,
    /// Snapshot application policy.
    pub snapshot_policy: SnapshotPolicy,
    /// Maximum number of resolved conflicts kept for inspection.
    pub conflict_history: usize,
}

impl SyncConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            retry: RetryConfig::default(),
            snapshot_policy: SnapshotPolicy::default(),
            conflict_history: 100,
        }
    }

    /// Sets the debounce interval.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the snapshot policy.
    #[must_use]
    pub const fn with_snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshot_policy = policy;
        self
    }

    /// Sets how many resolved conflicts are retained.
    #[must_use]
    pub const fn with_conflict_history(mut self, limit: usize) -> Self {
        self.conflict_history = limit;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: u32,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2,
        }
    }

    /// Creates a configuration with no retries.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Whether another attempt is allowed after `failed_attempts` failures.
    pub const fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }

    /// Delay before the retry that follows `failed_attempts` failures.
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }

        let factor = self
            .backoff_multiplier
            .checked_pow(failed_attempts - 1)
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
