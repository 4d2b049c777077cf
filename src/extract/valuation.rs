//! Per-token valuation extraction ("current value by token invested").

use std::collections::HashMap;

use super::fields::{derived_pnl, derived_pnl_pct, FieldSpec};
use crate::db::models::TokenValuation;
use crate::dune::Row;

const NAME: FieldSpec = FieldSpec::new("symbol", &["symbol", "token_name", "name", "token_symbol"]);
const CONTRACT: FieldSpec = FieldSpec::new(
    "token",
    &["token", "contract_address", "address", "contract"],
);
const INVESTED: FieldSpec = FieldSpec::new(
    "total_invested_usd",
    &[
        "total_usd_invested",
        "total_invested_usd",
        "total_invested",
        "invested_usd",
        "invested",
    ],
);
const AMOUNT_BOUGHT: FieldSpec = FieldSpec::new(
    "token_amount_bought",
    &[
        "total_tokens_bought",
        "token_amount_bought",
        "amount_bought",
        "token_amount",
        "amount",
        "quantity",
    ],
);
const CURRENT_VALUE: FieldSpec = FieldSpec::new(
    "current_value",
    &["current_value_usd", "current_value", "value", "value_usd"],
);
const PNL: FieldSpec = FieldSpec::new(
    "unrealized_pnl",
    &["unrealized_pnl", "unrealized_pnl_usd", "pnl", "pnl_usd"],
);
const PNL_PCT: FieldSpec = FieldSpec::new(
    "unrealized_pnl_pct",
    &[
        "unrealized_pnl_perc",
        "unrealized_pnl_percent",
        "pnl_perc",
        "pnl_percent",
    ],
);
const FIRST_PURCHASE: FieldSpec = FieldSpec::new(
    "first_purchase",
    &["first_purchase", "first_purchase_date", "first_buy_date"],
);
const LAST_PURCHASE: FieldSpec = FieldSpec::new(
    "last_purchase",
    &["last_purchase", "last_purchase_date", "last_buy_date"],
);

/// Extracts one valuation row without filtering.
///
/// `token` prefers the contract address and `symbol` prefers the name; each
/// falls back to the other so neither is empty unless both are.
pub fn extract_valuation(row: &Row) -> TokenValuation {
    let name = NAME.text(row).unwrap_or_default();
    let contract = CONTRACT.text(row).unwrap_or_default();

    let token = if contract.is_empty() { name.clone() } else { contract.clone() };
    let symbol = if name.is_empty() { contract } else { name };

    let total_invested_usd = INVESTED.number(row);
    let current_value = CURRENT_VALUE.number(row);

    TokenValuation {
        token,
        symbol,
        total_invested_usd,
        token_amount_bought: AMOUNT_BOUGHT.number(row),
        current_value,
        unrealized_pnl: PNL.number_or_else(row, || derived_pnl(current_value, total_invested_usd)),
        unrealized_pnl_pct: PNL_PCT
            .number_or_else(row, || derived_pnl_pct(current_value, total_invested_usd)),
        first_purchase: FIRST_PURCHASE.timestamp(row),
        last_purchase: LAST_PURCHASE.timestamp(row),
        updated_at: None,
    }
}

/// Extracts every row, dropping entries without a token or with a
/// non-positive current value.
///
/// Duplicate tokens keep the position of their first occurrence and the
/// values of their last, so the result is safe to upsert in one batch.
pub fn extract_valuations(rows: &[Row]) -> Vec<TokenValuation> {
    let mut valuations: Vec<TokenValuation> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(rows.len());

    for valuation in rows.iter().map(extract_valuation) {
        if valuation.token.is_empty() || valuation.current_value <= 0.0 {
            continue;
        }

        match positions.get(&valuation.token) {
            Some(&i) => valuations[i] = valuation,
            None => {
                positions.insert(valuation.token.clone(), valuations.len());
                valuations.push(valuation);
            },
        }
    }

    valuations
}
