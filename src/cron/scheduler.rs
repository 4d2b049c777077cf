//! Cron scheduler for the periodic dashboard sync.
//!
//! Registers a single repeated job that triggers [`SyncOrchestrator::run_sync`].
//! Gate rejections (a run still in flight, or the minimum interval not yet
//! elapsed) are logged and skipped; the next tick tries again.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use log::{error, info, warn};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::SyncSettings;
use crate::sync::SyncOrchestrator;

/// Cron scheduler that periodically syncs Dune data into the store.
pub struct CronScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    settings: Arc<CronSettings>,
}

/// Configuration for the scheduled sync
#[derive(Debug, Clone)]
pub struct CronSettings {
    /// Interval between scheduled syncs - default 6 hours
    pub sync_interval_secs: u64,
    /// Run one sync immediately after startup
    pub run_on_startup: bool,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            sync_interval_secs: 21_600, // 6 hours
            run_on_startup: false,
        }
    }
}

impl From<&SyncSettings> for CronSettings {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            sync_interval_secs: settings.interval_secs,
            run_on_startup: settings.run_on_startup,
        }
    }
}

impl CronScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, settings: CronSettings) -> Self {
        Self {
            orchestrator,
            settings: Arc::new(settings),
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        self.register_sync_job(&scheduler).await?;

        scheduler.start().await?;
        info!("[SCHEDULER] Cron scheduler started");

        if self.settings.run_on_startup {
            info!("[SCHEDULER] Running startup sync...");
            let orchestrator = self.orchestrator.clone();
            tokio::spawn(async move { run_scheduled(&orchestrator).await });
        }

        cancellation_token.cancelled().await;
        info!("[SCHEDULER] Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_sync_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let orchestrator = self.orchestrator.clone();
        let interval = self.settings.sync_interval_secs;

        let job = Job::new_repeated_async(Duration::from_secs(interval), move |_uuid, _lock| {
            let orchestrator = orchestrator.clone();
            Box::pin(async move {
                info!("[SCHEDULER] Triggering scheduled data sync...");
                run_scheduled(&orchestrator).await;
            })
        })?;

        scheduler.add(job).await?;
        info!(
            "[SCHEDULER] Registered dune sync job (every {})",
            format_interval(interval)
        );
        Ok(())
    }
}

async fn run_scheduled(orchestrator: &SyncOrchestrator) {
    match orchestrator.run_sync().await {
        Ok(()) => {},
        Err(e) if e.is_rejection() => warn!("[SCHEDULER] Skipped scheduled sync: {}", e),
        Err(e) => error!("[SCHEDULER] Scheduled sync failed: {:#}", e),
    }
}

fn format_interval(secs: u64) -> String {
    match secs {
        s if s >= 3600 && s % 3600 == 0 => format!("{}h", s / 3600),
        s if s >= 60 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}
