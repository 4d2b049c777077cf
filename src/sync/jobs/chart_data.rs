//! Syncs the daily price / market cap series. History is kept: points are
//! upserted by date and never deleted.

use anyhow::Result;
use log::info;

use super::SyncContext;
use crate::extract::extract_chart_points;

pub async fn run(ctx: &SyncContext<'_>) -> Result<usize> {
    info!("[SYNC] Starting chart data sync...");

    let rows = ctx.fetch(&ctx.queries.chart, "chart data").await;
    let points = extract_chart_points(&rows);

    ctx.store.upsert_chart_points(&points).await?;

    info!(
        "[SYNC] Chart data synced successfully: {} records",
        points.len()
    );
    Ok(points.len())
}
