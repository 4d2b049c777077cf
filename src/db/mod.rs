use async_trait::async_trait;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresClient;

use models::{ChartPoint, TokenMetrics, TokenValuation};

/// Write side of the dashboard cache.
///
/// Every write is idempotent: repeating it with the same input leaves the
/// store in the same state (apart from `updated_at`).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert, or overwrite every non-key field on `token_symbol` conflict and
    /// refresh `updated_at`. Metrics rows are never deleted.
    async fn upsert_token_metrics(&self, metrics: &TokenMetrics) -> anyhow::Result<()>;

    /// Insert or overwrite chart points keyed by date. Older dates are kept.
    async fn upsert_chart_points(&self, points: &[ChartPoint]) -> anyhow::Result<()>;

    /// Remove every stored valuation, then insert `valuations`.
    ///
    /// Afterwards the stored set equals `valuations` exactly.
    async fn replace_token_valuations(&self, valuations: &[TokenValuation]) -> anyhow::Result<()>;
}
