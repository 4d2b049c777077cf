use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use url::Url;

use super::{FetchError, QueryId, QuerySource, Row};
use crate::config::DuneSettings;

const API_KEY_HEADER: &str = "X-Dune-API-Key";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    result: Option<ResultsBody>,
}

#[derive(Debug, Deserialize)]
struct ResultsBody {
    #[serde(default)]
    rows: Vec<Row>,
}

/// Dune API v1 client reading the latest materialized result of a query.
///
/// Uses `GET /api/v1/query/{id}/results`, which returns cached results and
/// does not trigger a new execution.
#[derive(Clone)]
pub struct DuneClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl DuneClient {
    pub fn new(settings: &DuneSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to create Dune HTTP client")?;

        let mut base_url = Url::parse(&settings.base_url)
            .with_context(|| format!("Invalid Dune base url: {}", settings.base_url))?;

        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.trim().to_string(),
        })
    }

    fn results_url(&self, query_id: QueryId) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&format!("api/v1/query/{}/results", query_id))
    }
}

/// Extracts result rows from a results response body.
///
/// A body without `result.rows` (e.g. a query that never executed) is an
/// empty result, not an error.
fn decode_rows(body: &str) -> Result<Vec<Row>, serde_json::Error> {
    let response: ResultsResponse = serde_json::from_str(body)?;
    Ok(response.result.map(|r| r.rows).unwrap_or_default())
}

#[async_trait]
impl QuerySource for DuneClient {
    fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn fetch_latest_rows(&self, query_id: QueryId) -> Result<Vec<Row>, FetchError> {
        info!("[API CALL] Executing Dune query {}...", query_id);

        let url = self.results_url(query_id)?;
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                query_id,
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let rows = decode_rows(&body)?;
        info!(
            "[API CALL] Query {} completed - returned {} rows",
            query_id,
            rows.len()
        );
        Ok(rows)
    }
}
