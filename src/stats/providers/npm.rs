//! npm registry and downloads API implementation

use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::stats::error::ProviderError;
use crate::stats::normalize::parse_date;
use crate::stats::source::{DownloadSource, SourceRequest};
use crate::stats::types::{RegistryMetadata, Series};

/// Default base URL for npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Default base URL for npm downloads API
pub const DEFAULT_API_URL: &str = "https://api.npmjs.org";

/// Package document from npm registry, only the publish timestamps are read
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    #[serde(default)]
    time: HashMap<String, serde_json::Value>,
}

/// Response from the downloads range endpoint
#[derive(Debug, Deserialize)]
struct NpmRangeResponse {
    #[serde(default)]
    downloads: Vec<NpmDayRecord>,
}

#[derive(Debug, Deserialize)]
struct NpmDayRecord {
    #[serde(default)]
    day: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    downloads: Option<i64>,
}

/// Downloads source backed by the npm registry and downloads API
pub struct NpmDownloads {
    registry_url: String,
    api_url: String,
}

impl NpmDownloads {
    pub fn new(registry_url: &str, api_url: &str) -> Self {
        Self {
            registry_url: registry_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Encode package name for URL (handles scoped packages)
    pub fn encode_package_name(package_name: &str) -> String {
        if package_name.starts_with('@') {
            // Scoped package: @scope/name -> @scope%2Fname
            package_name.replace('/', "%2F")
        } else {
            package_name.to_string()
        }
    }

    fn auth_headers(token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = token.and_then(|t| HeaderValue::from_str(&format!("Bearer {}", t)).ok())
        {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Looks up the package creation date.
    ///
    /// `time.created` (or `time.created_at`) is used when present and not
    /// after `today`.
    pub async fn registry_metadata(
        &self,
        client: &reqwest::Client,
        package_name: &str,
        today: NaiveDate,
        token: Option<&str>,
    ) -> Result<RegistryMetadata, ProviderError> {
        let url = format!(
            "{}/{}",
            self.registry_url,
            Self::encode_package_name(package_name)
        );
        info!("npm: fetching registry metadata for {}", package_name);

        let response = client
            .get(&url)
            .headers(Self::auth_headers(token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status, url });
        }

        let package_info: NpmPackageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let earliest_date = ["created", "created_at"]
            .iter()
            .filter_map(|key| package_info.time.get(*key))
            .find_map(parse_date)
            .filter(|created| *created <= today);

        debug!("npm: creation date for {} = {:?}", package_name, earliest_date);
        Ok(RegistryMetadata { earliest_date })
    }

    fn range_url(&self, request: &SourceRequest<'_>) -> String {
        let period = match request.start_date {
            Some(start) => format!("{}:{}", start, request.today),
            None => format!("last-{}", request.window_days),
        };
        format!(
            "{}/downloads/range/{}/{}",
            self.api_url,
            period,
            Self::encode_package_name(request.package)
        )
    }
}

impl Default for NpmDownloads {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_URL, DEFAULT_API_URL)
    }
}

#[async_trait::async_trait]
impl DownloadSource for NpmDownloads {
    fn name(&self) -> &'static str {
        "npm downloads"
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: &SourceRequest<'_>,
    ) -> Result<Series, ProviderError> {
        let url = self.range_url(request);
        info!("npm: fetching downloads for {} url={}", request.package, url);

        let response = client
            .get(&url)
            .headers(Self::auth_headers(request.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("npm downloads API returned status {}: {}", status, url);
            return Err(ProviderError::Status { status, url });
        }

        let payload: NpmRangeResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse npm downloads response: {}", e);
            ProviderError::InvalidResponse(e.to_string())
        })?;

        let series = Series::from_observations(payload.downloads.into_iter().filter_map(|record| {
            let day = record.day.or(record.date)?;
            let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()?;
            Some((date, record.downloads.unwrap_or(0)))
        }));

        Ok(series.truncate_to_recent(request.window_days as usize))
    }
}
