mod chart_point;
mod token_metrics;
mod token_valuation;

pub use chart_point::ChartPoint;
pub use token_metrics::{PortfolioMetrics, PurchaseMetrics, TokenMetrics};
pub use token_valuation::TokenValuation;
