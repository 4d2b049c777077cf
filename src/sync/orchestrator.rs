use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::error::{minutes_remaining, SyncError, SyncStage};
use super::jobs::{self, SyncContext};
use super::state::{RunGuard, SyncRunState, SyncStatus};
use crate::config::{QuerySettings, SyncSettings};
use crate::db::SnapshotStore;
use crate::dune::QuerySource;

const BANNER: &str = "============================================================";

/// Outcome of a triggered run together with the status right after it.
#[derive(Debug)]
pub struct SyncReport {
    pub result: Result<(), SyncError>,
    pub status: SyncStatus,
}

/// Runs the sub-syncs in order, at most one run at a time and no more often
/// than `min_interval` (measured from the previous attempt).
pub struct SyncOrchestrator {
    source: Arc<dyn QuerySource>,
    store: Arc<dyn SnapshotStore>,
    queries: QuerySettings,
    default_symbol: String,
    min_interval: Duration,
    run_timeout: Option<Duration>,
    state: Mutex<SyncRunState>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn QuerySource>,
        store: Arc<dyn SnapshotStore>,
        queries: QuerySettings,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            queries,
            default_symbol: settings.default_symbol.clone(),
            min_interval: Duration::from_secs(settings.min_interval_secs),
            run_timeout: (settings.run_timeout_secs > 0)
                .then(|| Duration::from_secs(settings.run_timeout_secs)),
            state: Mutex::new(SyncRunState::default()),
        }
    }

    /// Current state. Never blocks on a running sync.
    pub fn status(&self) -> SyncStatus {
        self.state.lock().snapshot(self.min_interval)
    }

    /// Runs one sync and reports the result with the resulting status.
    pub async fn trigger(&self) -> SyncReport {
        let result = self.run_sync().await;
        SyncReport {
            result,
            status: self.status(),
        }
    }

    /// Runs metrics, chart and valuation syncs in sequence.
    ///
    /// The first failing stage aborts the run; stages that already completed
    /// stay committed. When the run timeout elapses the in-flight stage is
    /// dropped and the run fails with [`SyncError::TimedOut`].
    pub async fn run_sync(&self) -> Result<(), SyncError> {
        let _guard = self.begin()?;
        let started = std::time::Instant::now();

        info!("{}", BANNER);
        info!("[SYNC] Starting data sync from Dune API at {}", Utc::now().to_rfc3339());
        info!("{}", BANNER);

        let result = match self.run_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_stages())
                .await
                .unwrap_or(Err(SyncError::TimedOut(limit))),
            None => self.run_stages().await,
        };

        let api_calls = self.state.lock().api_call_count;

        match &result {
            Ok(()) => {
                self.state.lock().last_sync_time = Some(Utc::now());
                info!("{}", BANNER);
                info!("[SYNC] All data synced successfully in {:?}", started.elapsed());
                info!("[SYNC] Total API calls made: {}", api_calls);
                info!("{}", BANNER);
            },
            Err(e) => {
                error!("{}", BANNER);
                error!("[SYNC ERROR] Error syncing all data: {:#}", e);
                error!("[SYNC] API calls made before error: {}", api_calls);
                error!("{}", BANNER);
            },
        }

        result
    }

    /// Gate check-and-set, done under a single lock.
    fn begin(&self) -> Result<RunGuard<'_>, SyncError> {
        let mut state = self.state.lock();

        if state.is_syncing {
            warn!("[SYNC] Sync already in progress, skipping...");
            return Err(SyncError::AlreadyRunning);
        }

        let now = Instant::now();
        if let Some(last) = state.last_attempt_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_interval {
                let retry_after = self.min_interval - elapsed;
                warn!(
                    "[SYNC] Rate limit: last sync attempt was {}s ago, minimum interval is {} minutes",
                    elapsed.as_secs(),
                    minutes_remaining(&self.min_interval)
                );
                return Err(SyncError::RateLimited { retry_after });
            }
        }

        state.is_syncing = true;
        state.last_attempt_at = Some(now);
        state.last_sync_attempt = Some(Utc::now());
        state.api_call_count = 0;

        Ok(RunGuard::new(&self.state))
    }

    async fn run_stages(&self) -> Result<(), SyncError> {
        let ctx = SyncContext {
            source: self.source.as_ref(),
            store: self.store.as_ref(),
            queries: &self.queries,
            default_symbol: &self.default_symbol,
            state: &self.state,
        };

        jobs::token_metrics::run(&ctx)
            .await
            .map_err(|source| SyncError::Stage {
                stage: SyncStage::TokenMetrics,
                source,
            })?;

        jobs::chart_data::run(&ctx)
            .await
            .map_err(|source| SyncError::Stage {
                stage: SyncStage::ChartData,
                source,
            })?;

        jobs::token_valuations::run(&ctx)
            .await
            .map_err(|source| SyncError::Stage {
                stage: SyncStage::TokenValuations,
                source,
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::db::models::{ChartPoint, TokenMetrics, TokenValuation};
    use crate::db::MemoryStore;
    use crate::dune::{FetchError, QueryId, Row};

    const METRICS_ID: u64 = 11;
    const PORTFOLIO_ID: u64 = 12;
    const CHART_ID: u64 = 13;
    const VALUATIONS_ID: u64 = 14;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    fn valuation_row(token: &str, value: f64) -> Row {
        row(json!({ "token": token, "symbol": token, "current_value_usd": value }))
    }

    #[derive(Default)]
    struct FakeSource {
        responses: Mutex<HashMap<u64, Vec<Row>>>,
        calls: AtomicUsize,
        /// Query that blocks until the semaphore hands out a permit
        gate: Option<(u64, Arc<Semaphore>)>,
    }

    impl FakeSource {
        fn with_defaults() -> Self {
            let source = Self::default();
            source.set(
                METRICS_ID,
                vec![row(json!({ "token_symbol": "PUMP", "total_supply": 1000 }))],
            );
            source.set(
                PORTFOLIO_ID,
                vec![row(json!({ "total_usd_invested": 300, "current_value_usd": 500 }))],
            );
            source.set(
                CHART_ID,
                vec![row(json!({ "date": "2024-01-24", "price": 1.5, "market_cap": 10 }))],
            );
            source.set(
                VALUATIONS_ID,
                vec![valuation_row("A", 10.0), valuation_row("B", 20.0)],
            );
            source
        }

        fn set(&self, query_id: u64, rows: Vec<Row>) {
            self.responses.lock().insert(query_id, rows);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuerySource for FakeSource {
        async fn fetch_latest_rows(&self, query_id: QueryId) -> Result<Vec<Row>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some((gated_id, semaphore)) = &self.gate {
                if *gated_id == query_id.get() {
                    semaphore
                        .acquire()
                        .await
                        .map_err(|e| FetchError::Unavailable(e.to_string()))?
                        .forget();
                }
            }

            Ok(self
                .responses
                .lock()
                .get(&query_id.get())
                .cloned()
                .unwrap_or_default())
        }
    }

    /// Memory store whose chart writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_chart: AtomicBool,
    }

    #[async_trait]
    impl SnapshotStore for FlakyStore {
        async fn upsert_token_metrics(&self, metrics: &TokenMetrics) -> anyhow::Result<()> {
            self.inner.upsert_token_metrics(metrics).await
        }

        async fn upsert_chart_points(&self, points: &[ChartPoint]) -> anyhow::Result<()> {
            if self.fail_chart.load(Ordering::SeqCst) {
                anyhow::bail!("connection reset by peer");
            }
            self.inner.upsert_chart_points(points).await
        }

        async fn replace_token_valuations(
            &self,
            valuations: &[TokenValuation],
        ) -> anyhow::Result<()> {
            self.inner.replace_token_valuations(valuations).await
        }
    }

    fn queries() -> QuerySettings {
        QuerySettings {
            metrics: METRICS_ID.to_string(),
            portfolio: PORTFOLIO_ID.to_string(),
            chart: CHART_ID.to_string(),
            valuations: VALUATIONS_ID.to_string(),
        }
    }

    fn sync_settings(min_interval_secs: u64) -> SyncSettings {
        SyncSettings {
            min_interval_secs,
            ..SyncSettings::default()
        }
    }

    fn orchestrator(
        source: Arc<FakeSource>,
        store: Arc<dyn SnapshotStore>,
        min_interval_secs: u64,
    ) -> SyncOrchestrator {
        SyncOrchestrator::new(source, store, queries(), &sync_settings(min_interval_secs))
    }

    #[tokio::test]
    async fn test_successful_run_writes_all_tables() {
        let source = Arc::new(FakeSource::with_defaults());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(source.clone(), store.clone(), 300);

        let report = orch.trigger().await;

        assert!(report.result.is_ok());
        assert!(!report.status.is_syncing);
        assert!(report.status.last_sync_time.is_some());
        assert_eq!(report.status.api_call_count, 4);
        assert_eq!(source.calls(), 4);

        let metrics = store.token_metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].token_symbol, "PUMP");
        assert_eq!(metrics[0].total_supply, 1000.0);
        assert_eq!(metrics[0].portfolio_unrealized_pnl_usd, 200.0);
        assert_eq!(store.chart_points().len(), 1);
        assert_eq!(store.token_valuations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_blocks_until_interval_elapses() {
        let source = Arc::new(FakeSource::with_defaults());
        let orch = orchestrator(source.clone(), Arc::new(MemoryStore::new()), 300);

        orch.run_sync().await.unwrap();
        let calls_after_first = source.calls();

        let err = orch.run_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { .. }));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(300)));
        assert_eq!(
            err.to_string(),
            "Rate limit: please wait 5 more minutes before syncing again"
        );

        tokio::time::advance(Duration::from_secs(299)).await;
        let err = orch.run_sync().await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(1)));
        assert_eq!(source.calls(), calls_after_first);

        tokio::time::advance(Duration::from_secs(1)).await;
        orch.run_sync().await.unwrap();
        assert_eq!(source.calls(), calls_after_first * 2);
    }

    #[tokio::test]
    async fn test_concurrent_invocation_is_rejected() {
        let semaphore = Arc::new(Semaphore::new(0));
        let source = Arc::new(FakeSource {
            gate: Some((CHART_ID, semaphore.clone())),
            ..FakeSource::with_defaults()
        });
        let orch = Arc::new(orchestrator(source.clone(), Arc::new(MemoryStore::new()), 0));

        let running = orch.clone();
        let handle = tokio::spawn(async move { running.run_sync().await });

        // metrics + portfolio + the blocked chart call
        while source.calls() < 3 {
            tokio::task::yield_now().await;
        }

        let before = orch.status();
        assert!(before.is_syncing);
        assert_eq!(before.api_call_count, 2);

        let err = orch.run_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::AlreadyRunning));
        assert!(err.is_rejection());

        let during = orch.status();
        assert_eq!(during.api_call_count, 2);
        assert_eq!(during.last_sync_attempt, before.last_sync_attempt);
        assert_eq!(source.calls(), 3);

        semaphore.add_permits(1);
        handle.await.unwrap().unwrap();

        let after = orch.status();
        assert!(!after.is_syncing);
        assert_eq!(after.api_call_count, 4);
    }

    #[tokio::test]
    async fn test_failed_stage_aborts_and_keeps_earlier_writes() {
        let source = Arc::new(FakeSource::with_defaults());
        let store = Arc::new(FlakyStore::default());
        store.fail_chart.store(true, Ordering::SeqCst);
        let orch = orchestrator(source.clone(), store.clone(), 300);

        let report = orch.trigger().await;

        match report.result {
            Err(SyncError::Stage { stage, .. }) => assert_eq!(stage, SyncStage::ChartData),
            other => panic!("unexpected result: {:?}", other),
        }
        // metrics stage committed, valuation stage never ran
        assert_eq!(store.inner.token_metrics().len(), 1);
        assert!(store.inner.token_valuations().is_empty());

        assert!(!report.status.is_syncing);
        assert!(report.status.last_sync_time.is_none());
        assert!(report.status.last_sync_attempt.is_some());
        assert_eq!(report.status.api_call_count, 3);
        assert_eq!(source.calls(), 3);

        // failed attempts still count against the interval
        store.fail_chart.store(false, Ordering::SeqCst);
        let err = orch.run_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_metrics_upsert_is_idempotent() {
        let source = Arc::new(FakeSource::with_defaults());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(source, store.clone(), 0);

        orch.run_sync().await.unwrap();
        let first = store.token_metrics();
        orch.run_sync().await.unwrap();
        let second = store.token_metrics();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(second[0].updated_at > first[0].updated_at);
        assert_eq!(
            TokenMetrics {
                updated_at: None,
                ..second[0].clone()
            },
            TokenMetrics {
                updated_at: None,
                ..first[0].clone()
            }
        );
    }

    #[tokio::test]
    async fn test_valuation_set_is_replaced() {
        let source = Arc::new(FakeSource::with_defaults());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(source.clone(), store.clone(), 0);

        orch.run_sync().await.unwrap();
        source.set(VALUATIONS_ID, vec![valuation_row("A", 15.0)]);
        orch.run_sync().await.unwrap();

        let stored = store.token_valuations();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token, "A");
        assert_eq!(stored[0].current_value, 15.0);
    }

    #[tokio::test]
    async fn test_placeholder_queries_are_not_counted() {
        let source = Arc::new(FakeSource::with_defaults());
        let store = Arc::new(MemoryStore::new());
        let orch = SyncOrchestrator::new(
            source.clone(),
            store.clone(),
            QuerySettings {
                metrics: "0".to_string(),
                portfolio: PORTFOLIO_ID.to_string(),
                chart: String::new(),
                valuations: VALUATIONS_ID.to_string(),
            },
            &sync_settings(300),
        );

        orch.run_sync().await.unwrap();

        assert_eq!(orch.status().api_call_count, 2);
        assert_eq!(source.calls(), 2);
        // metrics query unset: default symbol with zeroed purchase figures
        let metrics = store.token_metrics();
        assert_eq!(metrics[0].token_symbol, "PUMP");
        assert_eq!(metrics[0].total_supply, 0.0);
        assert!(store.chart_points().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_run_times_out_and_releases_gate() {
        let semaphore = Arc::new(Semaphore::new(0));
        let source = Arc::new(FakeSource {
            gate: Some((VALUATIONS_ID, semaphore)),
            ..FakeSource::with_defaults()
        });
        let orch = SyncOrchestrator::new(
            source,
            Arc::new(MemoryStore::new()),
            queries(),
            &SyncSettings {
                min_interval_secs: 0,
                run_timeout_secs: 60,
                ..SyncSettings::default()
            },
        );

        let err = orch.run_sync().await.unwrap_err();

        assert!(matches!(err, SyncError::TimedOut(d) if d == Duration::from_secs(60)));
        let status = orch.status();
        assert!(!status.is_syncing);
        assert!(status.last_sync_time.is_none());
    }

    #[tokio::test]
    async fn test_status_before_first_run() {
        let orch = orchestrator(
            Arc::new(FakeSource::default()),
            Arc::new(MemoryStore::new()),
            300,
        );

        let status = orch.status();

        assert!(!status.is_syncing);
        assert_eq!(status.last_sync_attempt, None);
        assert_eq!(status.next_sync_allowed, None);
        assert_eq!(status.api_call_count, 0);
    }

    #[tokio::test]
    async fn test_next_sync_allowed_follows_attempt() {
        let orch = orchestrator(
            Arc::new(FakeSource::with_defaults()),
            Arc::new(MemoryStore::new()),
            300,
        );

        orch.run_sync().await.unwrap();
        let status = orch.status();

        let attempt = status.last_sync_attempt.unwrap();
        assert_eq!(
            status.next_sync_allowed,
            Some(attempt + chrono::Duration::seconds(300))
        );
    }
}
