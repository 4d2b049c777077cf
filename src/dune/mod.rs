//! Dune analytics data source.
//!
//! - [`QuerySource`] - the seam the sync layer fetches rows through
//! - [`DuneClient`] - HTTP implementation against the Dune API v1
//! - [`fetch_query`] - fail-soft wrapper that never surfaces errors upstream

mod client;
mod query;

pub use client::DuneClient;
pub use query::{fetch_query, FetchError, QueryId, QueryOutcome, QuerySource};

/// One result row as returned by the provider.
///
/// Column names and value types are provider-defined and vary between query
/// versions, so rows stay untyped until they reach the extractors.
pub type Row = serde_json::Map<String, serde_json::Value>;
