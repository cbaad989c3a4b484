//! PyPI JSON API implementation (release metadata only)

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use crate::stats::error::ProviderError;
use crate::stats::normalize::parse_date;
use crate::stats::types::RegistryMetadata;

/// Default base URL for PyPI
pub const DEFAULT_BASE_URL: &str = "https://pypi.org";

/// Response from PyPI JSON API
#[derive(Debug, Deserialize)]
struct PypiPackageResponse {
    #[serde(default)]
    releases: HashMap<String, Option<Vec<ReleaseFile>>>,
}

/// File uploaded for a release
#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    upload_time_iso_8601: Option<serde_json::Value>,
    #[serde(default)]
    upload_time: Option<serde_json::Value>,
}

/// Release metadata lookup against the PyPI JSON API
pub struct PypiRegistry {
    base_url: String,
}

impl PypiRegistry {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Finds the earliest upload date across every file of every release.
    ///
    /// Upload dates after `today` are ignored. A package without releases
    /// yields metadata with no earliest date.
    pub async fn registry_metadata(
        &self,
        client: &reqwest::Client,
        package_name: &str,
        today: NaiveDate,
    ) -> Result<RegistryMetadata, ProviderError> {
        let url = format!("{}/pypi/{}/json", self.base_url, package_name);
        info!("PyPI: fetching metadata {}", url);

        let response = client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status, url });
        }

        let package_info: PypiPackageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let earliest_date = package_info
            .releases
            .into_values()
            .flatten()
            .flatten()
            .filter_map(|file| {
                file.upload_time_iso_8601
                    .as_ref()
                    .or(file.upload_time.as_ref())
                    .and_then(parse_date)
            })
            .filter(|uploaded| *uploaded <= today)
            .min();

        debug!("PyPI: earliest upload date for {} = {:?}", package_name, earliest_date);
        Ok(RegistryMetadata { earliest_date })
    }
}

impl Default for PypiRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn registry_metadata_returns_earliest_upload_across_releases() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/pypi/cereon-sdk/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "info": {"name": "cereon-sdk"},
                    "releases": {
                        "0.2.0": [
                            {"upload_time_iso_8601": "2024-03-10T08:00:00.000000Z"},
                            {"upload_time_iso_8601": "2024-03-09T08:00:00.000000Z"}
                        ],
                        "0.1.0": [
                            {"upload_time": "2024-01-15T12:00:00"}
                        ],
                        "0.0.1": []
                    }
                }"#,
            )
            .create_async()
            .await;

        let registry = PypiRegistry::new(&server.url());
        let metadata = registry
            .registry_metadata(&reqwest::Client::new(), "cereon-sdk", date("2024-06-01"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(metadata.earliest_date, Some(date("2024-01-15")));
    }

    #[tokio::test]
    async fn registry_metadata_skips_future_and_unparseable_uploads() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/pypi/demo/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "releases": {
                        "2.0.0": [{"upload_time_iso_8601": "2031-01-01T00:00:00Z"}],
                        "1.0.0": [{"upload_time_iso_8601": "garbage"}, {}],
                        "0.9.0": [{"upload_time_iso_8601": "2023-05-05T00:00:00Z"}]
                    }
                }"#,
            )
            .create_async()
            .await;

        let registry = PypiRegistry::new(&server.url());
        let metadata = registry
            .registry_metadata(&reqwest::Client::new(), "demo", date("2024-06-01"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(metadata.earliest_date, Some(date("2023-05-05")));
    }

    #[tokio::test]
    async fn registry_metadata_is_empty_for_package_without_releases() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/pypi/empty/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"releases": {}}"#)
            .create_async()
            .await;

        let registry = PypiRegistry::new(&server.url());
        let metadata = registry
            .registry_metadata(&reqwest::Client::new(), "empty", date("2024-06-01"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(metadata, RegistryMetadata::default());
    }

    #[tokio::test]
    async fn registry_metadata_returns_status_error_for_missing_package() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/pypi/missing/json")
            .with_status(404)
            .create_async()
            .await;

        let registry = PypiRegistry::new(&server.url());
        let result = registry
            .registry_metadata(&reqwest::Client::new(), "missing", date("2024-06-01"))
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(ProviderError::Status { .. })));
    }
}
