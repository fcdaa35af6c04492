//! Reader session settings.

use std::time::Duration;

use crate::error::{ReaderError, ReaderResult};

const MIB: u64 = 1024 * 1024;

/// Smallest part size [`ReaderConfig::clamped`] allows.
pub const MIN_PART_SIZE: u64 = 5 * MIB;
/// Largest part size [`ReaderConfig::clamped`] allows.
pub const MAX_PART_SIZE: u64 = 100 * MIB;
/// Largest worker count [`ReaderConfig::clamped`] allows.
pub const MAX_PARALLELISM: usize = 64;

/// Settings for one reader session. Fixed for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Bytes per range request.
    pub part_size: u64,
    /// Number of fetch workers.
    pub parallelism: usize,
    /// Extra attempts per range after its first failure.
    pub retry_budget: u32,
    /// Lookahead window: maximum ranges reserved, in flight or cached but not
    /// yet consumed. `None` means three per worker.
    pub window: Option<usize>,
    /// Admission tick period.
    pub admission_interval: Duration,
    /// How long the consumer waits for the next chunk before re-checking for a
    /// fatal error.
    pub drain_poll_interval: Duration,
    /// How long an idle worker waits for work before re-checking for shutdown.
    pub worker_poll_interval: Duration,
    /// Delay before the second retry; later retries double it.
    pub backoff_base: Duration,
    /// Upper bound for a single backoff delay.
    pub backoff_max: Duration,
    /// How long `close` waits for workers to exit.
    pub join_timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            part_size: MIN_PART_SIZE,
            parallelism: 5,
            retry_budget: 5,
            window: None,
            admission_interval: Duration::from_millis(100),
            drain_poll_interval: Duration::from_millis(200),
            worker_poll_interval: Duration::from_millis(100),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(64),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl ReaderConfig {
    pub fn new(part_size: u64, parallelism: usize) -> Self {
        Self {
            part_size,
            parallelism,
            ..Self::default()
        }
    }

    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_admission_interval(mut self, interval: Duration) -> Self {
        self.admission_interval = interval;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Shortens every wait. Useful for tests and in-memory stores.
    pub fn with_poll_intervals(mut self, drain: Duration, worker: Duration) -> Self {
        self.drain_poll_interval = drain;
        self.worker_poll_interval = worker;
        self
    }

    /// Pulls part size and worker count into their supported ranges.
    ///
    /// A zero part size is left alone so [`validate`](Self::validate) still
    /// reports it.
    pub fn clamped(mut self) -> Self {
        if self.part_size > 0 {
            self.part_size = self.part_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        }
        self.parallelism = self.parallelism.clamp(1, MAX_PARALLELISM);
        if let Some(window) = self.window {
            self.window = Some(window.max(self.parallelism));
        }
        self
    }

    /// Effective lookahead window.
    pub fn window_size(&self) -> usize {
        self.window.unwrap_or(self.parallelism * 3)
    }

    /// Rejects settings the reader cannot run with.
    pub fn validate(&self) -> ReaderResult<()> {
        if self.part_size == 0 {
            return Err(ReaderError::Config("part size must be greater than zero".into()));
        }
        if self.parallelism == 0 {
            return Err(ReaderError::Config("parallelism must be at least 1".into()));
        }
        if self.window_size() == 0 {
            return Err(ReaderError::Config("lookahead window must be at least 1".into()));
        }
        if self.admission_interval.is_zero() {
            return Err(ReaderError::Config("admission interval must be non-zero".into()));
        }
        Ok(())
    }

    /// Delay before retrying after `failures` failed attempts of one range.
    ///
    /// The first retry is immediate; from then on the delay starts at
    /// `backoff_base` and doubles, capped at `backoff_max`.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        if failures <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 2).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.part_size, 5 * MIB);
        assert_eq!(config.retry_budget, 5);
        assert_eq!(config.window_size(), 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_clamped() {
        let config = ReaderConfig::new(1, 0).clamped();
        assert_eq!(config.part_size, MIN_PART_SIZE);
        assert_eq!(config.parallelism, 1);

        let config = ReaderConfig::new(1024 * MIB, 500).with_window(2).clamped();
        assert_eq!(config.part_size, MAX_PART_SIZE);
        assert_eq!(config.parallelism, MAX_PARALLELISM);
        assert_eq!(config.window_size(), MAX_PARALLELISM);
    }

    #[test]
    fn test_zero_part_size_survives_clamp_and_fails_validation() {
        let config = ReaderConfig::new(0, 4).clamped();
        assert!(matches!(config.validate(), Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let config = ReaderConfig::new(1024, 0);
        assert!(matches!(config.validate(), Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = ReaderConfig::default();
        let secs: Vec<u64> = (1..=9).map(|n| config.backoff_delay(n).as_secs()).collect();
        assert_eq!(secs, vec![0, 1, 2, 4, 8, 16, 32, 64, 64]);
        assert_eq!(config.backoff_delay(200), Duration::from_secs(64));
    }
}
