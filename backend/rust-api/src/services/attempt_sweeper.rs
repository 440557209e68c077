use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    error::ServiceResult, metrics::ATTEMPT_SWEEPER_TICKS_TOTAL,
    services::attempt_service::AttemptService,
};

/// Periodically submits attempts whose time ran out while nobody was watching
pub struct AttemptSweeper {
    attempts: AttemptService,
    interval: Duration,
}

impl AttemptSweeper {
    pub fn new(attempts: AttemptService, interval_secs: u64) -> Self {
        Self {
            attempts,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn run(&self) {
        info!(
            "Starting attempt sweeper loop (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            match self.run_once().await {
                Ok(0) => {
                    ATTEMPT_SWEEPER_TICKS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    debug!("Attempt sweeper tick completed, nothing expired");
                }
                Ok(submitted) => {
                    ATTEMPT_SWEEPER_TICKS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    info!(submitted, "Attempt sweeper auto-submitted expired attempts");
                }
                Err(err) => {
                    ATTEMPT_SWEEPER_TICKS_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    warn!(error = %err, "Attempt sweeper tick failed");
                }
            }

            sleep(self.interval).await;
        }
    }

    pub async fn run_once(&self) -> ServiceResult<usize> {
        self.attempts.auto_submit_expired().await
    }
}
