use std::{fmt, num::NonZeroU64};

use async_trait::async_trait;
use log::{error, info};

use super::Row;

/// Identifier of a pre-registered Dune query.
///
/// Zero is reserved as the "not configured" placeholder and never parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(NonZeroU64);

impl QueryId {
    pub fn new(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Self)
    }

    /// Parses a configured id. Empty, zero and non-numeric input yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().and_then(Self::new)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("query {query_id} returned HTTP {status}: {body}")]
    Status {
        query_id: QueryId,
        status: u16,
        body: String,
    },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid query url: {0}")]
    Url(#[from] url::ParseError),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Source of materialized query results.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Whether the source can make calls at all (e.g. an API key is set).
    fn is_enabled(&self) -> bool {
        true
    }

    /// Returns the latest materialized rows for `query_id`.
    async fn fetch_latest_rows(&self, query_id: QueryId) -> Result<Vec<Row>, FetchError>;
}

/// Result of one fail-soft query fetch.
#[derive(Debug)]
pub enum QueryOutcome {
    /// No call was made: placeholder id or disabled source.
    Skipped,
    Rows(Vec<Row>),
    /// A call was made and failed. Already logged.
    Failed(FetchError),
}

impl QueryOutcome {
    /// True when an external (billable) call was attempted.
    pub fn made_call(&self) -> bool {
        !matches!(self, QueryOutcome::Skipped)
    }

    /// Degrades to an empty row set on skip or failure.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Skipped | QueryOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Fetches `raw_id` from `source` without ever returning an error.
///
/// `label` only names the query in logs.
pub async fn fetch_query(source: &dyn QuerySource, raw_id: &str, label: &str) -> QueryOutcome {
    let Some(query_id) = QueryId::parse(raw_id) else {
        info!("[API CALL] Skipping {} query {:?} - invalid query ID", label, raw_id);
        return QueryOutcome::Skipped;
    };

    if !source.is_enabled() {
        info!("[API CALL] Skipping {} query {} - source disabled", label, query_id);
        return QueryOutcome::Skipped;
    }

    match source.fetch_latest_rows(query_id).await {
        Ok(rows) => QueryOutcome::Rows(rows),
        Err(e) => {
            error!(
                "[API CALL ERROR] Error fetching {} query {}: {:#}",
                label, query_id, e
            );
            QueryOutcome::Failed(e)
        },
    }
}
