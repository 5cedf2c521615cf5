use std::time::Duration;

use warden_core::{AppError, AppResult};

/// Throughput limits for bulk revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationConfig {
    /// Provider calls allowed per refill interval.
    pub batch_size: usize,
    /// Interval between limiter refills.
    pub refill_interval: Duration,
    /// Upper bound of concurrent workers.
    pub max_workers: usize,
}

impl RevocationConfig {
    /// Creates a validated configuration.
    pub fn new(
        batch_size: usize,
        refill_interval: Duration,
        max_workers: usize,
    ) -> AppResult<Self> {
        let config = Self {
            batch_size,
            refill_interval,
            max_workers,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero limits.
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(AppError::Configuration(
                "revocation batch size must be greater than zero".to_owned(),
            ));
        }

        if self.refill_interval.is_zero() {
            return Err(AppError::Configuration(
                "revocation refill interval must be greater than zero".to_owned(),
            ));
        }

        if self.max_workers == 0 {
            return Err(AppError::Configuration(
                "revocation worker count must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            refill_interval: Duration::from_secs(1),
            max_workers: 8,
        }
    }
}
