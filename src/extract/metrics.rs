//! Token metrics extraction (purchase volume, supply, portfolio totals).
//!
//! Both metrics queries return a single summary row; only the first row is
//! read and anything after it is ignored.

use super::fields::{derived_pnl, derived_pnl_pct, FieldSpec};
use crate::db::models::{PortfolioMetrics, PurchaseMetrics};
use crate::dune::Row;

const PURCHASES_NATIVE: FieldSpec = FieldSpec::new(
    "total_purchases_native",
    &["total_pump_purchases_sol", "pump_purchases_sol"],
);
const PURCHASES_USD: FieldSpec = FieldSpec::new(
    "total_purchases_usd",
    &["total_pump_purchases_usd", "pump_purchases_usd"],
);
const TOTAL_SUPPLY: FieldSpec = FieldSpec::new("total_supply", &["total_supply"]);
const CIRCULATING_OFFSET: FieldSpec = FieldSpec::new(
    "circulating_supply_offset",
    &["total_circulating_supply_offset", "circulating_supply_offset"],
);
const SYMBOL: FieldSpec = FieldSpec::new("token_symbol", &["token_symbol", "symbol"]);

const PORTFOLIO_INVESTED: FieldSpec = FieldSpec::new(
    "invested_usd",
    &[
        "total_usd_invested",
        "gff_investment_usd",
        "investment_usd",
        "total_investment_usd",
        "usd_invested",
        "investment",
    ],
);
const PORTFOLIO_VALUE: FieldSpec = FieldSpec::new(
    "value_usd",
    &[
        "current_value_usd",
        "current_value",
        "value_usd",
        "total_value_usd",
        "usd_value",
    ],
);
const PORTFOLIO_PNL: FieldSpec = FieldSpec::new(
    "unrealized_pnl_usd",
    &["unrealized_pnl", "unrealized_pnl_usd", "pnl", "unrealized_profit"],
);
const PORTFOLIO_PNL_PCT: FieldSpec = FieldSpec::new(
    "unrealized_pnl_pct",
    &[
        "unrealized_pnl_perc",
        "unrealized_pnl_percent",
        "pnl_perc",
        "pnl_percent",
        "unrealized_profit_perc",
    ],
);

/// Purchase metrics from the first row, or zeroed metrics for `default_symbol`.
pub fn extract_purchase_metrics(rows: &[Row], default_symbol: &str) -> PurchaseMetrics {
    let Some(row) = rows.first() else {
        return PurchaseMetrics::empty(default_symbol);
    };

    PurchaseMetrics {
        token_symbol: SYMBOL
            .text(row)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_symbol.to_string()),
        total_purchases_native: PURCHASES_NATIVE.number(row),
        total_purchases_usd: PURCHASES_USD.number(row),
        total_supply: TOTAL_SUPPLY.number(row),
        circulating_supply_offset: CIRCULATING_OFFSET.number(row),
    }
}

/// Portfolio totals from the first row. PnL figures are derived from value and
/// investment when the query does not provide them.
pub fn extract_portfolio_metrics(rows: &[Row]) -> PortfolioMetrics {
    let Some(row) = rows.first() else {
        return PortfolioMetrics::default();
    };

    let invested_usd = PORTFOLIO_INVESTED.number(row);
    let value_usd = PORTFOLIO_VALUE.number(row);

    PortfolioMetrics {
        invested_usd,
        value_usd,
        unrealized_pnl_usd: PORTFOLIO_PNL
            .number_or_else(row, || derived_pnl(value_usd, invested_usd)),
        unrealized_pnl_pct: PORTFOLIO_PNL_PCT
            .number_or_else(row, || derived_pnl_pct(value_usd, invested_usd)),
    }
}
