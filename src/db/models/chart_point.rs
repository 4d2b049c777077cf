use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily price / market cap point (PostgreSQL)
///
/// Primary Key: date
/// Query Pattern: "Get the full series ordered by day"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub price: f64,
    pub market_cap: f64,
}
