//! pepy.tech downloads-count service

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::stats::error::ProviderError;
use crate::stats::normalize::{downloads_service_entries, normalize_entries};
use crate::stats::source::{DownloadSource, SourceRequest, get_json};
use crate::stats::types::Series;

/// Default base URL for pepy
pub const DEFAULT_BASE_URL: &str = "https://pepy.tech";

/// Covers both `X-API-Key` and `X-API-KEY`, header names are case-insensitive
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PepyEndpoint {
    /// `/downloads?from={start}&to={today}`
    DateBounded,
    /// Project summary with a per-day `downloads` object
    Project,
}

/// One pepy endpoint in the PyPI fallback chain, only used with an API key
pub struct Pepy {
    base_url: String,
    endpoint: PepyEndpoint,
}

impl Pepy {
    pub fn new(base_url: &str, endpoint: PepyEndpoint) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint,
        }
    }

    pub fn chain(base_url: &str) -> Vec<Box<dyn DownloadSource>> {
        vec![
            Box::new(Self::new(base_url, PepyEndpoint::DateBounded)) as Box<dyn DownloadSource>,
            Box::new(Self::new(base_url, PepyEndpoint::Project)),
        ]
    }

    fn headers(api_key: &str) -> Result<HeaderMap, ProviderError> {
        let value = HeaderValue::from_str(api_key)
            .map_err(|_| ProviderError::NotApplicable("API key is not a valid header value"))?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        Ok(headers)
    }

    fn url(&self, request: &SourceRequest<'_>) -> Result<String, ProviderError> {
        let project_url = format!("{}/api/v2/projects/{}", self.base_url, request.package);
        match self.endpoint {
            PepyEndpoint::DateBounded => {
                let start = request
                    .start_date
                    .ok_or(ProviderError::NotApplicable("no derived start date"))?;
                Ok(format!(
                    "{}/downloads?from={}&to={}",
                    project_url, start, request.today
                ))
            }
            PepyEndpoint::Project => Ok(project_url),
        }
    }
}

#[async_trait::async_trait]
impl DownloadSource for Pepy {
    fn name(&self) -> &'static str {
        match self.endpoint {
            PepyEndpoint::DateBounded => "pepy downloads",
            PepyEndpoint::Project => "pepy project",
        }
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: &SourceRequest<'_>,
    ) -> Result<Series, ProviderError> {
        let api_key = request
            .api_key
            .ok_or(ProviderError::NotApplicable("no API key configured"))?;
        let url = self.url(request)?;

        let payload = get_json(client, &url, Self::headers(api_key)?).await?;
        Ok(normalize_entries(&downloads_service_entries(&payload)))
    }
}
