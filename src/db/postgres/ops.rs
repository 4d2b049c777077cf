use async_trait::async_trait;
use log::{error, info, warn};
use tokio_postgres::types::ToSql;

use super::client::is_undefined_table;
use crate::db::models::{ChartPoint, TokenMetrics, TokenValuation};
use crate::db::postgres::PostgresClient;
use crate::db::SnapshotStore;

/// Sanitize a string for PostgreSQL by removing null bytes (0x00)
/// which are invalid in UTF-8 text columns
fn sanitize_string(s: &str) -> String {
    s.replace('\0', "")
}

/// Build VALUES placeholders: ($1,$2,$3), ($4,$5,$6), ...
fn values_placeholders(rows: usize, cols: usize) -> String {
    (0..rows)
        .map(|i| {
            let start = i * cols + 1;
            let placeholders: Vec<String> = (start..start + cols).map(|n| format!("${}", n)).collect();
            format!("({})", placeholders.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

const CHART_COLS_PER_ROW: usize = 3;
const VALUATION_COLS_PER_ROW: usize = 9;
const BATCH_SIZE: usize = 500;

impl PostgresClient {
    // ==================== TOKEN METRICS ====================

    /// Most recently updated metrics row, `None` before the first sync.
    pub async fn latest_token_metrics(&self) -> anyhow::Result<Option<TokenMetrics>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                token_symbol, total_purchases_native, total_purchases_usd,
                total_supply, circulating_supply_offset,
                portfolio_invested_usd, portfolio_value_usd,
                portfolio_unrealized_pnl_usd, portfolio_unrealized_pnl_pct,
                updated_at
            FROM dashboard.token_metrics
            ORDER BY updated_at DESC
            LIMIT 1
        "#;

        let row = match client.query_opt(query, &[]).await {
            Ok(row) => row,
            Err(e) if is_undefined_table(&e) => {
                warn!("token_metrics table does not exist yet. Run migrations and sync.");
                return Ok(None);
            },
            Err(e) => return Err(e.into()),
        };

        Ok(row.map(|r| TokenMetrics {
            token_symbol: r.get("token_symbol"),
            total_purchases_native: r.get("total_purchases_native"),
            total_purchases_usd: r.get("total_purchases_usd"),
            total_supply: r.get("total_supply"),
            circulating_supply_offset: r.get("circulating_supply_offset"),
            portfolio_invested_usd: r.get("portfolio_invested_usd"),
            portfolio_value_usd: r.get("portfolio_value_usd"),
            portfolio_unrealized_pnl_usd: r.get("portfolio_unrealized_pnl_usd"),
            portfolio_unrealized_pnl_pct: r.get("portfolio_unrealized_pnl_pct"),
            updated_at: r.get("updated_at"),
        }))
    }

    // ==================== CHART DATA ====================

    /// Full chart series ordered by date.
    pub async fn chart_points(&self) -> anyhow::Result<Vec<ChartPoint>> {
        let client = self.pool.get().await?;
        let query = "SELECT date, price, market_cap FROM dashboard.chart_data ORDER BY date ASC";

        let rows = match client.query(query, &[]).await {
            Ok(rows) => rows,
            Err(e) if is_undefined_table(&e) => {
                warn!("chart_data table does not exist yet. Run migrations and sync.");
                return Ok(vec![]);
            },
            Err(e) => return Err(e.into()),
        };

        Ok(rows
            .iter()
            .map(|r| ChartPoint {
                date: r.get("date"),
                price: r.get("price"),
                market_cap: r.get("market_cap"),
            })
            .collect())
    }

    // ==================== TOKEN VALUATIONS ====================

    /// One valuation per symbol, highest current value first.
    ///
    /// When a symbol appears under several tokens, the row whose token looks
    /// like a contract address is preferred.
    pub async fn token_valuations(&self) -> anyhow::Result<Vec<TokenValuation>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT * FROM (
                SELECT DISTINCT ON (symbol)
                    token, symbol, total_invested_usd, token_amount_bought,
                    current_value, unrealized_pnl, unrealized_pnl_pct,
                    first_purchase, last_purchase, updated_at
                FROM dashboard.token_valuations
                WHERE symbol IS NOT NULL AND symbol != ''
                ORDER BY symbol,
                    CASE
                        WHEN token LIKE '%pump' OR LENGTH(token) > 20 THEN 1
                        ELSE 2
                    END
            ) AS unique_tokens
            ORDER BY current_value DESC
        "#;

        let rows = match client.query(query, &[]).await {
            Ok(rows) => rows,
            Err(e) if is_undefined_table(&e) => {
                warn!("token_valuations table does not exist yet. Run migrations and sync.");
                return Ok(vec![]);
            },
            Err(e) => return Err(e.into()),
        };

        Ok(rows
            .iter()
            .map(|r| TokenValuation {
                token: r.get("token"),
                symbol: r.get("symbol"),
                total_invested_usd: r.get("total_invested_usd"),
                token_amount_bought: r.get("token_amount_bought"),
                current_value: r.get("current_value"),
                unrealized_pnl: r.get("unrealized_pnl"),
                unrealized_pnl_pct: r.get("unrealized_pnl_pct"),
                first_purchase: r.get("first_purchase"),
                last_purchase: r.get("last_purchase"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for PostgresClient {
    async fn upsert_token_metrics(&self, metrics: &TokenMetrics) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO dashboard.token_metrics (
                token_symbol, total_purchases_native, total_purchases_usd,
                total_supply, circulating_supply_offset,
                portfolio_invested_usd, portfolio_value_usd,
                portfolio_unrealized_pnl_usd, portfolio_unrealized_pnl_pct,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (token_symbol) DO UPDATE SET
                total_purchases_native = EXCLUDED.total_purchases_native,
                total_purchases_usd = EXCLUDED.total_purchases_usd,
                total_supply = EXCLUDED.total_supply,
                circulating_supply_offset = EXCLUDED.circulating_supply_offset,
                portfolio_invested_usd = EXCLUDED.portfolio_invested_usd,
                portfolio_value_usd = EXCLUDED.portfolio_value_usd,
                portfolio_unrealized_pnl_usd = EXCLUDED.portfolio_unrealized_pnl_usd,
                portfolio_unrealized_pnl_pct = EXCLUDED.portfolio_unrealized_pnl_pct,
                updated_at = NOW()
        "#;

        let symbol = sanitize_string(&metrics.token_symbol);

        client
            .execute(
                query,
                &[
                    &symbol,
                    &metrics.total_purchases_native,
                    &metrics.total_purchases_usd,
                    &metrics.total_supply,
                    &metrics.circulating_supply_offset,
                    &metrics.portfolio_invested_usd,
                    &metrics.portfolio_value_usd,
                    &metrics.portfolio_unrealized_pnl_usd,
                    &metrics.portfolio_unrealized_pnl_pct,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to upsert token metrics for {}: {:?}", symbol, e);
                e
            })?;

        Ok(())
    }

    async fn upsert_chart_points(&self, points: &[ChartPoint]) -> anyhow::Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let client = self.pool.get().await?;

        for chunk in points.chunks(BATCH_SIZE) {
            let query = format!(
                r#"
                INSERT INTO dashboard.chart_data (date, price, market_cap)
                VALUES {}
                ON CONFLICT (date) DO UPDATE SET
                    price = EXCLUDED.price,
                    market_cap = EXCLUDED.market_cap,
                    updated_at = NOW()
                "#,
                values_placeholders(chunk.len(), CHART_COLS_PER_ROW)
            );

            let mut params: Vec<&(dyn ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * CHART_COLS_PER_ROW);
            for point in chunk {
                params.push(&point.date);
                params.push(&point.price);
                params.push(&point.market_cap);
            }

            client.execute(&query, &params).await.map_err(|e| {
                error!("Failed to batch upsert {} chart points: {:?}", chunk.len(), e);
                e
            })?;
        }

        Ok(())
    }

    /// Deletes every stored valuation and inserts `valuations` in one
    /// transaction, so readers never observe a half-replaced set.
    async fn replace_token_valuations(&self, valuations: &[TokenValuation]) -> anyhow::Result<()> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let removed = tx
            .execute("DELETE FROM dashboard.token_valuations", &[])
            .await
            .map_err(|e| {
                error!("Failed to clear token valuations: {:?}", e);
                e
            })?;

        let sanitized: Vec<(String, String)> = valuations
            .iter()
            .map(|v| (sanitize_string(&v.token), sanitize_string(&v.symbol)))
            .collect();

        for (chunk_index, chunk) in valuations.chunks(BATCH_SIZE).enumerate() {
            let query = format!(
                r#"
                INSERT INTO dashboard.token_valuations (
                    token, symbol, total_invested_usd, token_amount_bought,
                    current_value, unrealized_pnl, unrealized_pnl_pct,
                    first_purchase, last_purchase
                ) VALUES {}
                ON CONFLICT (token) DO UPDATE SET
                    symbol = EXCLUDED.symbol,
                    total_invested_usd = EXCLUDED.total_invested_usd,
                    token_amount_bought = EXCLUDED.token_amount_bought,
                    current_value = EXCLUDED.current_value,
                    unrealized_pnl = EXCLUDED.unrealized_pnl,
                    unrealized_pnl_pct = EXCLUDED.unrealized_pnl_pct,
                    first_purchase = EXCLUDED.first_purchase,
                    last_purchase = EXCLUDED.last_purchase,
                    updated_at = NOW()
                "#,
                values_placeholders(chunk.len(), VALUATION_COLS_PER_ROW)
            );

            let offset = chunk_index * BATCH_SIZE;
            let mut params: Vec<&(dyn ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * VALUATION_COLS_PER_ROW);
            for (i, valuation) in chunk.iter().enumerate() {
                params.push(&sanitized[offset + i].0);
                params.push(&sanitized[offset + i].1);
                params.push(&valuation.total_invested_usd);
                params.push(&valuation.token_amount_bought);
                params.push(&valuation.current_value);
                params.push(&valuation.unrealized_pnl);
                params.push(&valuation.unrealized_pnl_pct);
                params.push(&valuation.first_purchase);
                params.push(&valuation.last_purchase);
            }

            tx.execute(&query, &params).await.map_err(|e| {
                error!("Failed to batch insert {} token valuations: {:?}", chunk.len(), e);
                e
            })?;
        }

        tx.commit().await?;

        info!(
            "Replaced token valuations ({} removed, {} inserted)",
            removed,
            valuations.len()
        );
        Ok(())
    }
}
