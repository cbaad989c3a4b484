//! Candidate source trait and the ordered fallback driver

use chrono::NaiveDate;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::stats::error::ProviderError;
use crate::stats::types::Series;

/// Everything a candidate needs to build its upstream request
#[derive(Debug, Clone)]
pub struct SourceRequest<'a> {
    /// Registry-canonical package name
    pub package: &'a str,
    pub window_days: u32,
    /// Earliest publish/upload date derived from registry metadata
    pub start_date: Option<NaiveDate>,
    pub today: NaiveDate,
    /// Token or API key for sources that need one
    pub api_key: Option<&'a str>,
}

/// One upstream data source attempted in a fallback chain
#[async_trait::async_trait]
pub trait DownloadSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetches and normalizes the per-day series for a package
    ///
    /// # Returns
    /// * `Ok(Series)` - possibly empty, ascending by date
    /// * `Err(ProviderError::NotApplicable)` - the source cannot serve this request
    /// * `Err(ProviderError)` - the source failed
    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: &SourceRequest<'_>,
    ) -> Result<Series, ProviderError>;
}

/// Tries each source in order and returns the first non-empty series,
/// truncated to the requested window.
///
/// Failures are logged and the chain advances; nothing is retried. When no
/// source produced data, the last real failure (if any) is returned.
pub async fn first_non_empty(
    sources: &[Box<dyn DownloadSource>],
    client: &reqwest::Client,
    request: &SourceRequest<'_>,
) -> Result<Series, Option<ProviderError>> {
    let mut last_error = None;

    for source in sources {
        match source.fetch(client, request).await {
            Ok(series) if !series.is_empty() => {
                let series = series.truncate_to_recent(request.window_days as usize);
                info!(
                    "{} provided {} per-day entries for {}",
                    source.name(),
                    series.len(),
                    request.package
                );
                return Ok(series);
            }
            Ok(_) => {
                debug!("{} returned no entries for {}", source.name(), request.package);
            }
            Err(e) if e.is_not_applicable() => {
                debug!("Skipping {} for {}: {}", source.name(), request.package, e);
            }
            Err(e) => {
                warn!("{} failed for {}: {}", source.name(), request.package, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error)
}

/// Sends a GET request and parses the JSON body, failing on non-2xx status
pub async fn get_json(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
) -> Result<Value, ProviderError> {
    debug!("GET {}", url);
    let response = client.get(url).headers(headers).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            status,
            url: url.to_string(),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}
