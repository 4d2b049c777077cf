//! Row -> domain record extraction.
//!
//! Pure functions only. Every target field is resolved from an ordered list of
//! candidate column names ([`FieldSpec`]); numbers degrade to `0` and dates to
//! `None` instead of failing.
//!
//! - [`coerce`] - tolerant number / timestamp conversion
//! - [`fields`] - declarative field specs and derived PnL helpers
//! - [`metrics`] - purchase and portfolio summary rows
//! - [`valuation`] - per-token valuation rows
//! - [`chart`] - daily price series

pub mod chart;
pub mod coerce;
pub mod fields;
pub mod metrics;
pub mod valuation;

pub use chart::{extract_chart_point, extract_chart_points};
pub use fields::FieldSpec;
pub use metrics::{extract_portfolio_metrics, extract_purchase_metrics};
pub use valuation::{extract_valuation, extract_valuations};
