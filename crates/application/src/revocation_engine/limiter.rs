use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use super::RevocationConfig;

/// Token bucket shared by the workers of one bulk revocation.
///
/// Holds at most `batch_size` permits and is topped up once per
/// `refill_interval`. The refill task stops when the limiter is dropped or
/// the parent token is cancelled.
pub(crate) struct RevocationLimiter {
    permits: Arc<Semaphore>,
    _refill: DropGuard,
}

impl RevocationLimiter {
    pub(crate) fn start(config: &RevocationConfig, cancel: &CancellationToken) -> Self {
        let permits = Arc::new(Semaphore::new(config.batch_size));
        let stop = cancel.child_token();

        let refill_permits = Arc::clone(&permits);
        let refill_stop = stop.clone();
        let batch_size = config.batch_size;
        let refill_interval = config.refill_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refill_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = refill_stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let missing = batch_size.saturating_sub(refill_permits.available_permits());
                        if missing > 0 {
                            refill_permits.add_permits(missing);
                        }
                    }
                }
            }

            debug!("revocation limiter stopped");
        });

        Self {
            permits,
            _refill: stop.drop_guard(),
        }
    }

    /// Consumes one permit; returns false when cancelled first.
    pub(crate) async fn acquire(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            permit = self.permits.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    true
                }
                Err(_) => false,
            },
        }
    }
}
