//! Syncs current value by token invested.
//!
//! Replace-all: the stored set is swapped for the freshly extracted one, so a
//! token that drops out of the query result disappears from the dashboard.
//! An empty or failed fetch therefore clears the table.

use anyhow::Result;
use log::{info, warn};

use super::SyncContext;
use crate::extract::extract_valuations;

pub async fn run(ctx: &SyncContext<'_>) -> Result<usize> {
    info!("[SYNC] Starting current value by token sync...");

    let rows = ctx.fetch(&ctx.queries.valuations, "current value by token").await;
    let valuations = extract_valuations(&rows);

    if valuations.len() < rows.len() {
        warn!(
            "[SYNC] Dropped {} of {} valuation rows (no token, non-positive value or duplicate)",
            rows.len() - valuations.len(),
            rows.len()
        );
    }

    ctx.store.replace_token_valuations(&valuations).await?;

    info!(
        "[SYNC] Current value by token synced successfully: {} records",
        valuations.len()
    );
    Ok(valuations.len())
}
