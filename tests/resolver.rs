//! Resolver tests against mocked upstream services

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use mockito::{Matcher, Server, ServerGuard};

use pkgstats::config::ProviderConfig;
use pkgstats::stats::error::ProviderError;
use pkgstats::stats::providers::warehouse::{DailyRow, Warehouse};
use pkgstats::stats::{
    DownloadPoint, DownloadStatsResolver, Ecosystem, Endpoints, ProviderQuery, SeriesOrigin,
};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn resolver(server: &ServerGuard, config: ProviderConfig) -> DownloadStatsResolver {
    DownloadStatsResolver::with_endpoints(config, Endpoints::all(&server.url()))
        .with_aliases(HashMap::from([(
            "cereon-dashboard".to_string(),
            "@cereon/dashboard".to_string(),
        )]))
        .with_warehouse(None)
        .with_today(date("2024-02-01"))
}

fn daily_entries(start: &str, days: u32) -> String {
    let start = date(start);
    let entries: Vec<String> = (0..days)
        .map(|i| {
            let day = start + chrono::Days::new(u64::from(i));
            format!(r#"{{"date": "{}", "downloads": {}}}"#, day, i + 1)
        })
        .collect();
    format!(r#"{{"data": [{}]}}"#, entries.join(","))
}

struct CountingWarehouse {
    rows: Vec<DailyRow>,
    calls: Arc<AtomicUsize>,
}

impl Warehouse for CountingWarehouse {
    fn daily_downloads(
        &self,
        _project: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<DailyRow>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

#[tokio::test]
async fn npm_requests_range_from_creation_date() {
    let mut server = Server::new_async().await;

    let registry = server
        .mock("GET", "/@cereon%2Fdashboard")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"time": {"created": "2024-01-01T09:00:00.000Z"}}"#)
        .create_async()
        .await;
    let range = server
        .mock("GET", "/downloads/range/2024-01-01:2024-02-01/@cereon%2Fdashboard")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"downloads": [{"day": "2024-01-31", "downloads": 4}]}"#)
        .create_async()
        .await;
    let last_n = server
        .mock("GET", "/downloads/range/last-30/@cereon%2Fdashboard")
        .expect(0)
        .create_async()
        .await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("cereon-dashboard", Ecosystem::Npm, 30);
    let series = resolver.resolve(&query).await.unwrap();

    registry.assert_async().await;
    range.assert_async().await;
    last_n.assert_async().await;
    assert_eq!(series.points(), &[DownloadPoint::new(date("2024-01-31"), 4)]);
}

#[tokio::test]
async fn npm_falls_back_to_last_n_days_when_registry_lookup_fails() {
    let mut server = Server::new_async().await;

    let registry = server
        .mock("GET", "/left-pad")
        .with_status(503)
        .create_async()
        .await;
    let last_n = server
        .mock("GET", "/downloads/range/last-7/left-pad")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"downloads": [{"day": "2024-01-31", "downloads": 9}]}"#)
        .create_async()
        .await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("left-pad", Ecosystem::Npm, 7);
    let series = resolver.resolve(&query).await.unwrap();

    registry.assert_async().await;
    last_n.assert_async().await;
    assert_eq!(series.len(), 1);
}

#[tokio::test]
async fn npm_failure_surfaces_no_authoritative_data() {
    let mut server = Server::new_async().await;

    let _registry = server
        .mock("GET", "/left-pad")
        .with_status(404)
        .create_async()
        .await;
    let downloads = server
        .mock("GET", "/downloads/range/last-30/left-pad")
        .with_status(500)
        .create_async()
        .await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("left-pad", Ecosystem::Npm, 30);
    let error = resolver.resolve(&query).await.unwrap_err();

    downloads.assert_async().await;
    assert_eq!(error.package, "left-pad");
    assert_eq!(error.ecosystem, Ecosystem::Npm);
    assert!(matches!(error.cause, Some(ProviderError::Status { .. })));
}

#[tokio::test]
async fn pypi_range_normalizes_string_counts() {
    let mut server = Server::new_async().await;

    let _meta = server
        .mock("GET", "/pypi/cereon-sdk/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"releases": {"0.1.0": [{"upload_time_iso_8601": "2024-01-01T00:00:00Z"}]}}"#)
        .create_async()
        .await;
    let range = server
        .mock("GET", "/api/packages/cereon-sdk/range/2024-01-01:2024-02-01")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"date": "2024-01-01", "downloads": "10"}]"#)
        .create_async()
        .await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("cereon-sdk", Ecosystem::Pypi, 1);
    let series = resolver.resolve(&query).await.unwrap();

    range.assert_async().await;
    assert_eq!(series.points(), &[DownloadPoint::new(date("2024-01-01"), 10)]);
}

#[tokio::test]
async fn pypi_uses_recent_endpoint_without_trying_paid_service() {
    let mut server = Server::new_async().await;

    let _meta = server
        .mock("GET", "/pypi/cereon-sdk/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"releases": {"0.1.0": [{"upload_time_iso_8601": "2023-11-01T00:00:00Z"}]}}"#)
        .create_async()
        .await;
    let range = server
        .mock(
            "GET",
            Matcher::Regex(r"^/api/packages/cereon-sdk/range/.*$".to_string()),
        )
        .with_status(500)
        .expect(2)
        .create_async()
        .await;
    let overall = server
        .mock("GET", "/api/packages/cereon-sdk/overall")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let recent = server
        .mock("GET", "/api/packages/cereon-sdk/recent")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(daily_entries("2024-01-27", 5))
        .create_async()
        .await;
    let pepy = server
        .mock(
            "GET",
            Matcher::Regex(r"^/api/v2/projects/.*$".to_string()),
        )
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = ProviderConfig {
        pepy_api_key: Some("secret".to_string()),
        ..ProviderConfig::default()
    };
    let resolver = resolver(&server, config);
    let query = ProviderQuery::new("cereon-sdk", Ecosystem::Pypi, 30);
    let series = resolver.resolve(&query).await.unwrap();

    range.assert_async().await;
    overall.assert_async().await;
    recent.assert_async().await;
    pepy.assert_async().await;
    assert_eq!(series.len(), 5);
    assert_eq!(series.first_date(), Some(date("2024-01-27")));
    assert_eq!(series.last_date(), Some(date("2024-01-31")));
}

#[tokio::test]
async fn pypi_truncates_long_series_to_most_recent_window() {
    let mut server = Server::new_async().await;

    let _meta = server
        .mock("GET", "/pypi/cereon-sdk/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"releases": {}}"#)
        .create_async()
        .await;
    let overall = server
        .mock("GET", "/api/packages/cereon-sdk/overall")
        .match_query(Matcher::UrlEncoded("mirrors".into(), "false".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(daily_entries("2024-01-01", 10))
        .create_async()
        .await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("cereon-sdk", Ecosystem::Pypi, 3);
    let series = resolver.resolve(&query).await.unwrap();

    overall.assert_async().await;
    assert_eq!(
        series.points(),
        &[
            DownloadPoint::new(date("2024-01-08"), 8),
            DownloadPoint::new(date("2024-01-09"), 9),
            DownloadPoint::new(date("2024-01-10"), 10),
        ]
    );
}

#[tokio::test]
async fn pypi_uses_query_token_for_downloads_service() {
    let mut server = Server::new_async().await;

    let project = server
        .mock("GET", "/api/v2/projects/cereon-sdk")
        .match_header("x-api-key", "from-query")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"downloads": {"2024-01-30": 3, "2024-01-31": 4}}"#)
        .create_async()
        .await;

    let config = ProviderConfig {
        pepy_api_key: Some("from-config".to_string()),
        ..ProviderConfig::default()
    };
    let resolver = resolver(&server, config);
    let query = ProviderQuery::new("cereon-sdk", Ecosystem::Pypi, 30)
        .with_token(Some("from-query".to_string()));
    let series = resolver.resolve(&query).await.unwrap();

    project.assert_async().await;
    assert_eq!(series.len(), 2);
}

#[tokio::test]
async fn pypi_falls_back_to_warehouse() {
    let server = Server::new_async().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let warehouse = CountingWarehouse {
        rows: vec![
            DailyRow { date: date("2024-01-30"), downloads: 11 },
            DailyRow { date: date("2024-01-31"), downloads: 12 },
        ],
        calls: Arc::clone(&calls),
    };

    let resolver = resolver(&server, ProviderConfig::default())
        .with_warehouse(Some(Arc::new(warehouse)));
    let query = ProviderQuery::new("cereon-sdk", Ecosystem::Pypi, 30);
    let series = resolver.resolve(&query).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(series.last_date(), Some(date("2024-01-31")));
    assert_eq!(series.len(), 2);
}

#[tokio::test]
async fn pypi_without_any_data_surfaces_no_authoritative_data() {
    let server = Server::new_async().await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("cereon-sdk", Ecosystem::Pypi, 30);
    let error = resolver.resolve(&query).await.unwrap_err();

    assert_eq!(error.package, "cereon-sdk");
    assert_eq!(error.ecosystem, Ecosystem::Pypi);
    assert!(error.to_string().contains("cereon-sdk"));
}

#[tokio::test]
async fn resolve_or_synthesize_substitutes_full_window() {
    let server = Server::new_async().await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("cereon-sdk", Ecosystem::Pypi, 45);
    let resolution = resolver.resolve_or_synthesize(&query).await;

    assert_eq!(resolution.origin, SeriesOrigin::Synthetic);
    assert_eq!(resolution.series.len(), 45);
    assert_eq!(resolution.series.last_date(), Some(date("2024-02-01")));
    assert!(
        resolution
            .series
            .points()
            .windows(2)
            .all(|w| w[0].date < w[1].date)
    );
}

#[tokio::test]
async fn resolve_or_synthesize_keeps_upstream_data() {
    let mut server = Server::new_async().await;

    let _downloads = server
        .mock("GET", "/downloads/range/last-30/left-pad")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"downloads": [{"day": "2024-01-31", "downloads": -3}]}"#)
        .create_async()
        .await;

    let resolver = resolver(&server, ProviderConfig::default());
    let query = ProviderQuery::new("left-pad", Ecosystem::Npm, 30);
    let resolution = resolver.resolve_or_synthesize(&query).await;

    assert_eq!(resolution.origin, SeriesOrigin::Upstream);
    // Negative upstream counts are clamped
    assert_eq!(
        resolution.series.points(),
        &[DownloadPoint::new(date("2024-01-31"), 0)]
    );
}
