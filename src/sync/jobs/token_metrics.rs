//! Syncs the token metrics snapshot.
//!
//! Combines two single-row queries (purchase/supply metrics and portfolio
//! totals) into one `dashboard.token_metrics` row keyed by symbol.

use anyhow::Result;
use log::info;

use super::SyncContext;
use crate::db::models::TokenMetrics;
use crate::extract::{extract_portfolio_metrics, extract_purchase_metrics};

pub async fn run(ctx: &SyncContext<'_>) -> Result<TokenMetrics> {
    info!("[SYNC] Starting token metrics sync...");

    let rows = ctx.fetch(&ctx.queries.metrics, "token metrics").await;
    let purchases = extract_purchase_metrics(&rows, ctx.default_symbol);

    let rows = ctx.fetch(&ctx.queries.portfolio, "portfolio metrics").await;
    let portfolio = extract_portfolio_metrics(&rows);

    let metrics = TokenMetrics::new(purchases, portfolio);
    ctx.store.upsert_token_metrics(&metrics).await?;

    info!(
        "[SYNC] Token metrics synced successfully ({})",
        metrics.token_symbol
    );
    Ok(metrics)
}
