use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Purchase volume and supply figures for the tracked token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseMetrics {
    pub token_symbol: String,
    pub total_purchases_native: f64,
    pub total_purchases_usd: f64,
    pub total_supply: f64,
    pub circulating_supply_offset: f64,
}

impl PurchaseMetrics {
    /// All-zero metrics, used when the metrics query yields nothing.
    pub fn empty(token_symbol: &str) -> Self {
        Self {
            token_symbol: token_symbol.to_string(),
            total_purchases_native: 0.0,
            total_purchases_usd: 0.0,
            total_supply: 0.0,
            circulating_supply_offset: 0.0,
        }
    }
}

/// Aggregate investment portfolio figures (all positions combined).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub invested_usd: f64,
    pub value_usd: f64,
    pub unrealized_pnl_usd: f64,
    pub unrealized_pnl_pct: f64,
}

/// Token metrics snapshot (PostgreSQL)
///
/// Primary Key: token_symbol
///
/// One row per symbol, overwritten on every sync. `updated_at` is assigned by
/// the store and is `None` until the record has been written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub token_symbol: String,
    pub total_purchases_native: f64,
    pub total_purchases_usd: f64,
    pub total_supply: f64,
    pub circulating_supply_offset: f64,
    pub portfolio_invested_usd: f64,
    pub portfolio_value_usd: f64,
    pub portfolio_unrealized_pnl_usd: f64,
    pub portfolio_unrealized_pnl_pct: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TokenMetrics {
    pub fn new(purchases: PurchaseMetrics, portfolio: PortfolioMetrics) -> Self {
        Self {
            token_symbol: purchases.token_symbol,
            total_purchases_native: purchases.total_purchases_native,
            total_purchases_usd: purchases.total_purchases_usd,
            total_supply: purchases.total_supply,
            circulating_supply_offset: purchases.circulating_supply_offset,
            portfolio_invested_usd: portfolio.invested_usd,
            portfolio_value_usd: portfolio.value_usd,
            portfolio_unrealized_pnl_usd: portfolio.unrealized_pnl_usd,
            portfolio_unrealized_pnl_pct: portfolio.unrealized_pnl_pct,
            updated_at: None,
        }
    }
}
