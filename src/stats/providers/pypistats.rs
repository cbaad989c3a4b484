//! pypistats.org aggregator endpoints

use reqwest::header::HeaderMap;

use crate::stats::error::ProviderError;
use crate::stats::normalize::{aggregator_entries, normalize_entries};
use crate::stats::source::{DownloadSource, SourceRequest, get_json};
use crate::stats::types::Series;

/// Default base URL for pypistats
pub const DEFAULT_BASE_URL: &str = "https://pypistats.org";

/// Endpoint variant of the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PypiStatsEndpoint {
    /// `/range/{start}:{today}`
    RangeColon,
    /// `/range/{start}/{today}`
    RangeSlash,
    /// `/overall?mirrors=false`, retention is roughly 180 days
    Overall,
    /// `/recent`
    Recent,
}

/// One aggregator endpoint in the PyPI fallback chain
pub struct PypiStats {
    base_url: String,
    endpoint: PypiStatsEndpoint,
}

impl PypiStats {
    pub fn new(base_url: &str, endpoint: PypiStatsEndpoint) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint,
        }
    }

    /// Every endpoint in the order they are attempted
    pub fn chain(base_url: &str) -> Vec<Box<dyn DownloadSource>> {
        [
            PypiStatsEndpoint::RangeColon,
            PypiStatsEndpoint::RangeSlash,
            PypiStatsEndpoint::Overall,
            PypiStatsEndpoint::Recent,
        ]
        .into_iter()
        .map(|endpoint| Box::new(Self::new(base_url, endpoint)) as Box<dyn DownloadSource>)
        .collect()
    }

    fn url(&self, request: &SourceRequest<'_>) -> Result<String, ProviderError> {
        let package_url = format!("{}/api/packages/{}", self.base_url, request.package);
        let url = match self.endpoint {
            PypiStatsEndpoint::RangeColon | PypiStatsEndpoint::RangeSlash => {
                let start = request
                    .start_date
                    .ok_or(ProviderError::NotApplicable("no derived start date"))?;
                let delimiter = if self.endpoint == PypiStatsEndpoint::RangeColon {
                    ':'
                } else {
                    '/'
                };
                format!("{}/range/{}{}{}", package_url, start, delimiter, request.today)
            }
            PypiStatsEndpoint::Overall => format!("{}/overall?mirrors=false", package_url),
            PypiStatsEndpoint::Recent => format!("{}/recent", package_url),
        };
        Ok(url)
    }
}

#[async_trait::async_trait]
impl DownloadSource for PypiStats {
    fn name(&self) -> &'static str {
        match self.endpoint {
            PypiStatsEndpoint::RangeColon => "pypistats range (colon)",
            PypiStatsEndpoint::RangeSlash => "pypistats range (slash)",
            PypiStatsEndpoint::Overall => "pypistats overall",
            PypiStatsEndpoint::Recent => "pypistats recent",
        }
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: &SourceRequest<'_>,
    ) -> Result<Series, ProviderError> {
        let url = self.url(request)?;
        let payload = get_json(client, &url, HeaderMap::new()).await?;
        Ok(normalize_entries(aggregator_entries(&payload)))
    }
}
