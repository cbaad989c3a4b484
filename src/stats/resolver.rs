//! Download statistics resolver
//!
//! Resolves a [`ProviderQuery`] into a [`Series`] by walking an ordered list of
//! upstream candidates for the query's ecosystem. A fresh HTTP client is built
//! for each resolution and dropped when it ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::config::ProviderConfig;
use crate::stats::error::{NoAuthoritativeData, ProviderError};
use crate::stats::providers::warehouse::{BigQueryClient, Warehouse, WarehouseSource};
use crate::stats::providers::{NpmDownloads, Pepy, PypiRegistry, PypiStats};
use crate::stats::providers::{npm, pepy, pypi, pypistats, warehouse};
use crate::stats::source::{DownloadSource, SourceRequest, first_non_empty};
use crate::stats::synthetic::{self, SyntheticProfile};
use crate::stats::types::{Ecosystem, ProviderQuery, Series};

/// Per-request timeout for npm endpoints
pub const NPM_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request timeout for PyPI endpoints
pub const PYPI_TIMEOUT: Duration = Duration::from_secs(20);

/// Base URLs of every upstream service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub npm_registry: String,
    pub npm_api: String,
    pub pypi: String,
    pub pypistats: String,
    pub pepy: String,
    pub warehouse: String,
}

impl Endpoints {
    /// Points every service at one base URL (useful against a mock server)
    pub fn all(base_url: &str) -> Self {
        Self {
            npm_registry: base_url.to_string(),
            npm_api: base_url.to_string(),
            pypi: base_url.to_string(),
            pypistats: base_url.to_string(),
            pepy: base_url.to_string(),
            warehouse: base_url.to_string(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            npm_registry: npm::DEFAULT_REGISTRY_URL.to_string(),
            npm_api: npm::DEFAULT_API_URL.to_string(),
            pypi: pypi::DEFAULT_BASE_URL.to_string(),
            pypistats: pypistats::DEFAULT_BASE_URL.to_string(),
            pepy: pepy::DEFAULT_BASE_URL.to_string(),
            warehouse: warehouse::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Where a resolved series came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOrigin {
    Upstream,
    Synthetic,
}

/// Result of a resolution that never fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub series: Series,
    pub origin: SeriesOrigin,
}

pub struct DownloadStatsResolver {
    endpoints: Endpoints,
    config: ProviderConfig,
    aliases: HashMap<String, String>,
    warehouse: Option<Arc<dyn Warehouse>>,
    today: Option<NaiveDate>,
}

impl DownloadStatsResolver {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_endpoints(config, Endpoints::default())
    }

    pub fn with_endpoints(config: ProviderConfig, endpoints: Endpoints) -> Self {
        let warehouse = config.warehouse.clone().map(|credentials| {
            Arc::new(BigQueryClient::with_endpoint(credentials, &endpoints.warehouse))
                as Arc<dyn Warehouse>
        });

        Self {
            endpoints,
            config,
            aliases: HashMap::new(),
            warehouse,
            today: None,
        }
    }

    /// Maps internal package keys to registry-canonical names
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Replaces the warehouse client; `None` disables the warehouse candidate
    pub fn with_warehouse(mut self, warehouse: Option<Arc<dyn Warehouse>>) -> Self {
        self.warehouse = warehouse;
        self
    }

    /// Pins the date treated as today
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Registry-canonical name for a package identifier
    pub fn canonical_name<'a>(&'a self, package_identifier: &'a str) -> &'a str {
        self.aliases
            .get(package_identifier)
            .map(String::as_str)
            .unwrap_or(package_identifier)
    }

    /// Resolves a query into a series of at most `window_days` points.
    ///
    /// # Returns
    /// * `Ok(Series)` - non-empty for PyPI, possibly empty for npm
    /// * `Err(NoAuthoritativeData)` - no upstream source could provide data
    pub async fn resolve(&self, query: &ProviderQuery) -> Result<Series, NoAuthoritativeData> {
        let outcome = match query.ecosystem {
            Ecosystem::Npm => self.resolve_npm(query).await.map_err(Some),
            Ecosystem::Pypi => self.resolve_pypi(query).await,
        };

        outcome.map_err(|cause| {
            error!(
                "Unable to obtain per-day {} download counts for package '{}'",
                query.ecosystem, query.package_identifier
            );
            NoAuthoritativeData {
                package: query.package_identifier.clone(),
                ecosystem: query.ecosystem,
                cause,
            }
        })
    }

    /// Resolves a query, substituting a synthetic series when no upstream
    /// source could provide data
    pub async fn resolve_or_synthesize(&self, query: &ProviderQuery) -> Resolution {
        match self.resolve(query).await {
            Ok(series) => Resolution {
                series,
                origin: SeriesOrigin::Upstream,
            },
            Err(e) => {
                warn!("Using synthetic fallback series for {}: {}", query.package_identifier, e);
                Resolution {
                    series: self.synthesize(query),
                    origin: SeriesOrigin::Synthetic,
                }
            }
        }
    }

    fn synthesize(&self, query: &ProviderQuery) -> Series {
        synthetic::series(
            self.today(),
            query.window_days,
            SyntheticProfile::for_ecosystem(query.ecosystem),
            &mut rand::rng(),
        )
    }

    fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
        Ok(reqwest::Client::builder()
            .user_agent("pkgstats")
            .timeout(timeout)
            .build()?)
    }

    async fn resolve_npm(&self, query: &ProviderQuery) -> Result<Series, ProviderError> {
        let package = self.canonical_name(&query.package_identifier);
        let token = query
            .registry_token
            .as_deref()
            .or(self.config.npm_token.as_deref());
        let today = self.today();
        let client = Self::build_client(NPM_TIMEOUT)?;
        let npm = NpmDownloads::new(&self.endpoints.npm_registry, &self.endpoints.npm_api);

        let start_date = match npm.registry_metadata(&client, package, today, token).await {
            Ok(metadata) => metadata.earliest_date,
            Err(e) => {
                debug!("npm: registry lookup failed for {}: {}", package, e);
                None
            }
        };

        let request = SourceRequest {
            package,
            window_days: query.window_days,
            start_date,
            today,
            api_key: token,
        };

        npm.fetch(&client, &request).await.inspect_err(|e| {
            error!("npm: failed package={} error={}", package, e);
        })
    }

    async fn resolve_pypi(&self, query: &ProviderQuery) -> Result<Series, Option<ProviderError>> {
        let package = self.canonical_name(&query.package_identifier);
        let today = self.today();
        let client = Self::build_client(PYPI_TIMEOUT).map_err(Some)?;

        let start_date = match PypiRegistry::new(&self.endpoints.pypi)
            .registry_metadata(&client, package, today)
            .await
        {
            Ok(metadata) => metadata.earliest_date,
            Err(e) => {
                debug!("PyPI: metadata lookup failed for {}: {}", package, e);
                None
            }
        };
        if let Some(start) = start_date {
            info!("PyPI: earliest upload date for {} = {}", package, start);
        }

        let request = SourceRequest {
            package,
            window_days: query.window_days,
            start_date,
            today,
            api_key: query
                .registry_token
                .as_deref()
                .or(self.config.pepy_api_key.as_deref()),
        };

        first_non_empty(&self.pypi_sources(), &client, &request).await
    }

    fn pypi_sources(&self) -> Vec<Box<dyn DownloadSource>> {
        let mut sources = PypiStats::chain(&self.endpoints.pypistats);
        sources.extend(Pepy::chain(&self.endpoints.pepy));
        sources.push(Box::new(WarehouseSource::new(self.warehouse.clone())));
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_translates_known_aliases() {
        let resolver = DownloadStatsResolver::new(ProviderConfig::default()).with_aliases(
            HashMap::from([("cereon-dashboard".to_string(), "@cereon/dashboard".to_string())]),
        );

        assert_eq!(resolver.canonical_name("cereon-dashboard"), "@cereon/dashboard");
        assert_eq!(resolver.canonical_name("left-pad"), "left-pad");
    }

    #[test]
    fn warehouse_is_configured_only_with_credentials() {
        let resolver = DownloadStatsResolver::new(ProviderConfig::default());
        assert!(resolver.warehouse.is_none());

        let config = ProviderConfig {
            warehouse: Some(crate::config::WarehouseCredentials {
                project_id: "p".to_string(),
                access_token: "t".to_string(),
            }),
            ..ProviderConfig::default()
        };
        let resolver = DownloadStatsResolver::new(config);
        assert!(resolver.warehouse.is_some());
    }

    #[test]
    fn pypi_chain_runs_aggregator_then_service_then_warehouse() {
        let resolver = DownloadStatsResolver::new(ProviderConfig::default());

        let names: Vec<&str> = resolver.pypi_sources().iter().map(|s| s.name()).collect();

        assert_eq!(
            names,
            vec![
                "pypistats range (colon)",
                "pypistats range (slash)",
                "pypistats overall",
                "pypistats recent",
                "pepy downloads",
                "pepy project",
                "warehouse",
            ]
        );
    }

    #[test]
    fn today_can_be_pinned() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let resolver = DownloadStatsResolver::new(ProviderConfig::default()).with_today(today);
        assert_eq!(resolver.today(), today);
    }
}
