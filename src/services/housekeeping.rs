use super::activity_log::ActivityLogService;
use chrono::Duration as ChronoDuration;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

/// Periodic maintenance: purges activity log rows past retention.
pub struct HousekeepingWorker {
    activity: ActivityLogService,
    retention: ChronoDuration,
    interval: Duration,
}

impl HousekeepingWorker {
    pub fn new(activity: ActivityLogService, retention: ChronoDuration, interval: Duration) -> Self {
        Self {
            activity,
            retention,
            interval,
        }
    }

    /// One sweep. Errors are logged, never propagated.
    pub async fn run_once(&self) -> u64 {
        match self.activity.purge_older_than(self.retention).await {
            Ok(removed) => removed,
            Err(e) => {
                error!("housekeeping sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweeps immediately, then every `interval`, until the task is aborted.
    pub fn start(self) -> JoinHandle<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention.num_days(),
            "Starting housekeeping worker"
        );
        tokio::spawn(async move {
            loop {
                self.run_once().await;
                sleep(self.interval).await;
            }
        })
    }
}
