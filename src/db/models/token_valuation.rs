use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current value of one invested token (PostgreSQL)
///
/// Primary Key: token
///
/// `token` is the contract address when the provider returns one, otherwise
/// the human symbol. The whole table is replaced on every sync so tokens that
/// drop out of the upstream result disappear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenValuation {
    pub token: String,
    pub symbol: String,
    pub total_invested_usd: f64,
    pub token_amount_bought: f64,
    pub current_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    pub first_purchase: Option<DateTime<Utc>>,
    pub last_purchase: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TokenValuation {
    /// Heuristic for "token holds a contract address rather than a symbol".
    ///
    /// Pump.fun mints end in `pump`; anything longer than 20 chars is treated as
    /// an address as well.
    pub fn has_contract_address(&self) -> bool {
        self.token.ends_with("pump") || self.token.len() > 20
    }
}
