use std::{fmt, time::Duration};

/// One step of a sync run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    TokenMetrics,
    ChartData,
    TokenValuations,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::TokenMetrics => "token metrics",
            SyncStage::ChartData => "chart data",
            SyncStage::TokenValuations => "token valuations",
        };
        f.write_str(name)
    }
}

/// Why a sync run did not complete.
///
/// `AlreadyRunning` and `RateLimited` are expected gate rejections (nothing
/// was fetched or written); the other variants are run failures.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Sync already in progress")]
    AlreadyRunning,
    #[error(
        "Rate limit: please wait {} more minutes before syncing again",
        minutes_remaining(.retry_after)
    )]
    RateLimited { retry_after: Duration },
    #[error("Sync timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Error syncing {stage}: {source:#}")]
    Stage {
        stage: SyncStage,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    /// Time until the gate opens again, for rate-limit rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// True when the run was refused by the gate and did no work.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SyncError::AlreadyRunning | SyncError::RateLimited { .. })
    }
}

/// Whole minutes left, rounded up so "wait 0 minutes" is never shown.
pub fn minutes_remaining(wait: &Duration) -> u64 {
    wait.as_secs().div_ceil(60).max(1)
}
