use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

/// Mutable bookkeeping of one orchestrator. In memory only: a restart loses
/// the history, the synced tables stay authoritative.
#[derive(Debug, Default)]
pub struct SyncRunState {
    pub is_syncing: bool,
    /// Wall-clock start of the latest attempt, successful or not
    pub last_sync_attempt: Option<DateTime<Utc>>,
    /// Monotonic start of the latest attempt, used for rate limiting
    pub last_attempt_at: Option<Instant>,
    /// Completion time of the latest successful run
    pub last_sync_time: Option<DateTime<Utc>>,
    /// External calls made by the current (or latest) run
    pub api_call_count: u32,
}

impl SyncRunState {
    pub fn snapshot(&self, min_interval: Duration) -> SyncStatus {
        SyncStatus {
            is_syncing: self.is_syncing,
            last_sync_time: self.last_sync_time,
            last_sync_attempt: self.last_sync_attempt,
            api_call_count: self.api_call_count,
            next_sync_allowed: self.last_sync_attempt.and_then(|attempt| {
                chrono::Duration::from_std(min_interval)
                    .ok()
                    .map(|interval| attempt + interval)
            }),
        }
    }
}

/// Read-only view of the sync state for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub api_call_count: u32,
    pub next_sync_allowed: Option<DateTime<Utc>>,
}

/// Marks a run as in flight; clears `is_syncing` when dropped, whether the run
/// finished, failed, panicked or was cancelled.
pub(crate) struct RunGuard<'a> {
    state: &'a Mutex<SyncRunState>,
}

impl<'a> RunGuard<'a> {
    pub(crate) fn new(state: &'a Mutex<SyncRunState>) -> Self {
        Self { state }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().is_syncing = false;
    }
}
