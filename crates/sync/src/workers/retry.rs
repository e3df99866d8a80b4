use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, info};

use crate::controller::StorageController;

/// Periodically drains the pending write queue.
///
/// Connectivity is never probed separately: a drain attempt either delivers
/// writes or leaves them queued for the next tick.
pub struct RetryWorker {
    controller: Arc<StorageController>,
    interval: Duration,
}

impl RetryWorker {
    pub fn new(controller: Arc<StorageController>, interval: Duration) -> Self {
        Self {
            controller,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub async fn run(self) {
        info!("RetryWorker started (interval: {:?})", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.controller.pending_writes() == 0 {
                continue;
            }
            let report = self.controller.flush_pending().await;
            debug!(?report, "retry tick");
        }
    }
}
