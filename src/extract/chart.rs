use std::collections::BTreeMap;

use super::fields::FieldSpec;
use crate::db::models::ChartPoint;
use crate::dune::Row;

const DATE: FieldSpec = FieldSpec::new("date", &["date", "day", "block_date"]);
const PRICE: FieldSpec = FieldSpec::new("price", &["price", "price_sol"]);
const MARKET_CAP: FieldSpec = FieldSpec::new("market_cap", &["market_cap", "market_cap_sol"]);

/// Extracts one chart point. Rows without a parseable date are skipped.
pub fn extract_chart_point(row: &Row) -> Option<ChartPoint> {
    let date = DATE.timestamp(row)?.date_naive();

    Some(ChartPoint {
        date,
        price: PRICE.number(row),
        market_cap: MARKET_CAP.number(row),
    })
}

/// Extracts the series ordered by date, one point per day (last row wins).
pub fn extract_chart_points(rows: &[Row]) -> Vec<ChartPoint> {
    rows.iter()
        .filter_map(extract_chart_point)
        .map(|point| (point.date, point))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect()
}
