//! Periodic catalog refresh
//!
//! The first interval tick is skipped unless `run_on_start` is set. A failed
//! run is logged and the schedule carries on.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

use super::refresh::{CancellationFlag, CatalogRefreshJob};

/// Longest supported interval, one year
const MAX_INTERVAL_HOURS: u64 = 24 * 366;

/// When the refresh job runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshScheduleConfig {
    pub interval_hours: u64,
    pub run_on_start: bool,
}

impl RefreshScheduleConfig {
    pub fn every_hours(interval_hours: u64) -> Self {
        Self {
            interval_hours,
            run_on_start: false,
        }
    }
}

/// Start the refresh scheduler as a background task
///
/// The task runs until `cancel` is set; an in-flight run stops at the next
/// product boundary.
pub fn start_refresh_scheduler(
    job: Arc<CatalogRefreshJob>,
    config: RefreshScheduleConfig,
    cancel: CancellationFlag,
) -> JoinHandle<()> {
    info!(
        "Starting catalog refresh scheduler: every {} hours",
        config.interval_hours
    );

    tokio::spawn(async move {
        let hours = config.interval_hours.clamp(1, MAX_INTERVAL_HOURS);
        let mut ticker = interval(Duration::from_secs(hours * 3600));

        // The first tick completes immediately
        if !config.run_on_start {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            if cancel.is_cancelled() {
                break;
            }

            match job.run(&cancel).await {
                Ok(report) => info!(
                    "Scheduled refresh complete: {} updated, {} unchanged, {} missed",
                    report.updated,
                    report.unchanged,
                    report.missed.len()
                ),
                Err(e) => error!("Scheduled catalog refresh failed: {}", e),
            }

            if cancel.is_cancelled() {
                break;
            }
        }
        info!("Catalog refresh scheduler stopped");
    })
}
