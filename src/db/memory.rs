use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;

use super::models::{ChartPoint, TokenMetrics, TokenValuation};
use super::SnapshotStore;

#[derive(Default)]
struct Tables {
    metrics: BTreeMap<String, TokenMetrics>,
    chart: BTreeMap<NaiveDate, ChartPoint>,
    valuations: BTreeMap<String, TokenValuation>,
    last_write: Option<DateTime<Utc>>,
}

impl Tables {
    /// Wall clock, nudged forward so consecutive writes never share a stamp.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_write {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        self.last_write = Some(stamp);
        stamp
    }
}

/// In-process [`SnapshotStore`] with the same upsert / replace-all semantics
/// as the PostgreSQL tables. Used for dry runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_metrics(&self) -> Vec<TokenMetrics> {
        self.tables.lock().metrics.values().cloned().collect()
    }

    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.tables.lock().chart.values().cloned().collect()
    }

    /// Stored valuations ordered by token.
    pub fn token_valuations(&self) -> Vec<TokenValuation> {
        self.tables.lock().valuations.values().cloned().collect()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn upsert_token_metrics(&self, metrics: &TokenMetrics) -> anyhow::Result<()> {
        let mut tables = self.tables.lock();
        let mut stored = metrics.clone();
        stored.updated_at = Some(tables.next_timestamp());
        tables.metrics.insert(stored.token_symbol.clone(), stored);
        Ok(())
    }

    async fn upsert_chart_points(&self, points: &[ChartPoint]) -> anyhow::Result<()> {
        let mut tables = self.tables.lock();
        for point in points {
            tables.chart.insert(point.date, point.clone());
        }
        Ok(())
    }

    async fn replace_token_valuations(&self, valuations: &[TokenValuation]) -> anyhow::Result<()> {
        let mut tables = self.tables.lock();
        let stamp = tables.next_timestamp();
        tables.valuations.clear();
        for valuation in valuations {
            let mut stored = valuation.clone();
            stored.updated_at = Some(stamp);
            tables.valuations.insert(stored.token.clone(), stored);
        }
        Ok(())
    }
}
