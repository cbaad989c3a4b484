//! Bulk-analytics warehouse source (BigQuery public PyPI download events)
//!
//! The warehouse client is synchronous. [`WarehouseSource`] moves each query
//! onto the blocking thread pool so concurrent resolutions keep running.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use pep508_rs::PackageName;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::config::WarehouseCredentials;
use crate::stats::error::ProviderError;
use crate::stats::normalize::{parse_count, parse_date};
use crate::stats::source::{DownloadSource, SourceRequest};
use crate::stats::types::Series;

/// Default base URL for the BigQuery REST API
pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Lookback used when no earliest upload date is known
pub const DEFAULT_LOOKBACK_DAYS: u64 = 5 * 365;

const DAILY_DOWNLOADS_SQL: &str = r#"
SELECT
  DATE(timestamp) AS day,
  COUNT(*) AS downloads
FROM `bigquery-public-data.pypi.file_downloads`
WHERE LOWER(file.project) = @pkg
  AND DATE(timestamp) BETWEEN @start_date AND @end_date
GROUP BY day
ORDER BY day
"#;

const QUERY_TIMEOUT_MS: u64 = 60_000;

/// Downloads of a project on one day, as reported by the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub downloads: i64,
}

/// Blocking day-grouped download query
#[cfg_attr(test, mockall::automock)]
pub trait Warehouse: Send + Sync {
    /// Counts downloads of `project` per day between `start` and `end` inclusive
    fn daily_downloads(
        &self,
        project: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRow>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "jobComplete", default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    f: Vec<QueryCell>,
}

#[derive(Debug, Deserialize)]
struct QueryCell {
    #[serde(default)]
    v: Value,
}

/// Warehouse implementation over the BigQuery `jobs.query` REST endpoint
pub struct BigQueryClient {
    endpoint: String,
    credentials: WarehouseCredentials,
    timeout: Duration,
}

impl BigQueryClient {
    pub fn new(credentials: WarehouseCredentials) -> Self {
        Self::with_endpoint(credentials, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(credentials: WarehouseCredentials, endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
            timeout: Duration::from_millis(QUERY_TIMEOUT_MS + 30_000),
        }
    }

    fn query_body(project: &str, start: NaiveDate, end: NaiveDate) -> Value {
        let parameter = |name: &str, kind: &str, value: String| {
            json!({
                "name": name,
                "parameterType": {"type": kind},
                "parameterValue": {"value": value},
            })
        };

        json!({
            "query": DAILY_DOWNLOADS_SQL,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "timeoutMs": QUERY_TIMEOUT_MS,
            "queryParameters": [
                parameter("pkg", "STRING", project.to_string()),
                parameter("start_date", "DATE", start.to_string()),
                parameter("end_date", "DATE", end.to_string()),
            ],
        })
    }
}

impl Warehouse for BigQueryClient {
    fn daily_downloads(
        &self,
        project: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRow>, ProviderError> {
        // Built per query: a blocking client must not live on an async worker.
        let client = reqwest::blocking::Client::builder()
            .user_agent("pkgstats")
            .timeout(self.timeout)
            .build()?;

        let url = format!(
            "{}/projects/{}/queries",
            self.endpoint, self.credentials.project_id
        );

        let response = client
            .post(&url)
            .bearer_auth(&self.credentials.access_token)
            .json(&Self::query_body(project, start, end))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status, url });
        }

        let payload: QueryResponse = response
            .json()
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if !payload.job_complete {
            return Err(ProviderError::Warehouse(
                "query did not complete before timeout".to_string(),
            ));
        }

        Ok(payload
            .rows
            .iter()
            .filter_map(|row| {
                let date = row.f.first().and_then(|cell| parse_date(&cell.v))?;
                let downloads = row.f.get(1).and_then(|cell| parse_count(&cell.v))?;
                Some(DailyRow { date, downloads })
            })
            .collect())
    }
}

/// Project name as stored by the warehouse: PEP 503 normalized.
///
/// Names that are not valid Python package names (such as scoped npm-style
/// names) have no warehouse counterpart.
pub fn warehouse_project_name(package: &str) -> Option<String> {
    PackageName::from_str(package).ok().map(|name| name.to_string())
}

/// Last candidate of the PyPI chain; only applicable with a configured warehouse
pub struct WarehouseSource {
    warehouse: Option<Arc<dyn Warehouse>>,
}

impl WarehouseSource {
    pub fn new(warehouse: Option<Arc<dyn Warehouse>>) -> Self {
        Self { warehouse }
    }
}

#[async_trait::async_trait]
impl DownloadSource for WarehouseSource {
    fn name(&self) -> &'static str {
        "warehouse"
    }

    async fn fetch(
        &self,
        _client: &reqwest::Client,
        request: &SourceRequest<'_>,
    ) -> Result<Series, ProviderError> {
        let warehouse = self
            .warehouse
            .clone()
            .ok_or(ProviderError::NotApplicable("no warehouse credentials"))?;
        let project = warehouse_project_name(request.package)
            .ok_or(ProviderError::NotApplicable("not a Python package name"))?;

        let end = request.today;
        let start = request.start_date.unwrap_or_else(|| {
            end.checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
                .unwrap_or(NaiveDate::MIN)
        });

        info!(
            "PyPI: running warehouse per-day aggregation for {} from {} to {}",
            project, start, end
        );

        let rows = tokio::task::spawn_blocking(move || {
            warehouse.daily_downloads(&project, start, end)
        })
        .await
        .map_err(|e| ProviderError::Warehouse(e.to_string()))??;

        Ok(Series::from_observations(
            rows.into_iter().map(|row| (row.date, row.downloads)),
        ))
    }
}
