use chrono::{DateTime, Utc};
use serde_json::Value;

use super::coerce::{is_present, parse_timestamp, to_number};
use crate::dune::Row;

/// A target field and the provider columns it may come from, in priority
/// order. The provider has renamed columns across query versions, so every
/// known name is listed.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub candidates: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Self { name, candidates }
    }

    /// First present candidate value.
    pub fn raw<'a>(&self, row: &'a Row) -> Option<&'a Value> {
        self.candidates
            .iter()
            .filter_map(|key| row.get(*key))
            .find(|value| is_present(value))
    }

    /// Resolved number, `0.0` when absent or non-numeric.
    pub fn number(&self, row: &Row) -> f64 {
        self.raw(row).and_then(to_number).unwrap_or(0.0)
    }

    /// Resolved number, computing `derive` when absent, non-numeric or zero.
    pub fn number_or_else<F>(&self, row: &Row, derive: F) -> f64
    where
        F: FnOnce() -> f64,
    {
        match self.raw(row).and_then(to_number) {
            Some(v) if v != 0.0 => v,
            _ => derive(),
        }
    }

    /// Resolved value rendered as text. Numbers keep their JSON form.
    pub fn text(&self, row: &Row) -> Option<String> {
        self.raw(row).map(|value| match value {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
    }

    /// Resolved timestamp. Non-string values and unparseable strings are `None`.
    pub fn timestamp(&self, row: &Row) -> Option<DateTime<Utc>> {
        self.raw(row)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }
}

/// `value - invested`.
pub fn derived_pnl(value: f64, invested: f64) -> f64 {
    value - invested
}

/// PnL as a percentage of `invested`, `0.0` when nothing was invested.
pub fn derived_pnl_pct(value: f64, invested: f64) -> f64 {
    if invested > 0.0 {
        (value - invested) / invested * 100.0
    } else {
        0.0
    }
}
