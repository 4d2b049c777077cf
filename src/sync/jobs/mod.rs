//! Sub-syncs: fetch -> extract -> persist, one per dashboard table.

pub mod chart_data;
pub mod token_metrics;
pub mod token_valuations;

use parking_lot::Mutex;

use crate::config::QuerySettings;
use crate::db::SnapshotStore;
use crate::dune::{fetch_query, QuerySource, Row};

use super::state::SyncRunState;

/// Everything a sub-sync needs for one run.
pub struct SyncContext<'a> {
    pub source: &'a dyn QuerySource,
    pub store: &'a dyn SnapshotStore,
    pub queries: &'a QuerySettings,
    pub default_symbol: &'a str,
    pub(crate) state: &'a Mutex<SyncRunState>,
}

impl SyncContext<'_> {
    /// Fail-soft fetch that counts every external call actually made.
    pub async fn fetch(&self, raw_id: &str, label: &str) -> Vec<Row> {
        let outcome = fetch_query(self.source, raw_id, label).await;
        if outcome.made_call() {
            self.state.lock().api_call_count += 1;
        }
        outcome.into_rows()
    }
}
