//! Package summary chart cards
//!
//! Every card is a list of rows `{date, <package key>: value, ...}` wrapped in
//! the envelope the charting frontend consumes.

use chrono::NaiveDate;
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::report::catalog::{Catalog, PackageEntry};
use crate::report::github::{GitHubClient, RepoRef};
use crate::stats::resolver::DownloadStatsResolver;
use crate::stats::synthetic::{self, SyntheticProfile};
use crate::stats::types::{Ecosystem, ProviderQuery, Series};

pub const REPORT_ID: &str = "package_summary";

/// Mock mode always renders at least a year of data
pub const MOCK_MIN_DAYS: u32 = 365;

/// Star counts the mock stars card starts from, per package key
const MOCK_STAR_BASES: [(&str, u64); 3] = [
    ("cereon-dashboard", 300),
    ("cereon-recharts", 150),
    ("cereon-sdk", 80),
];

/// Per-day values of one package
pub type DailyValues = Vec<(NaiveDate, u64)>;

/// One chart row: `date` followed by one column per package
pub type ChartRow = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    Downloads,
    Commits,
    Stars,
}

impl CardKind {
    pub fn kind(self) -> &'static str {
        match self {
            CardKind::Downloads => "recharts:area",
            CardKind::Commits => "recharts:line",
            CardKind::Stars => "recharts:bar",
        }
    }

    pub fn card_id(self) -> &'static str {
        match self {
            CardKind::Downloads => "packages_downloads_area",
            CardKind::Commits => "packages_commits_line",
            CardKind::Stars => "packages_likes_bar",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub data: Vec<ChartRow>,
}

/// Envelope consumed by the charting frontend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartCard {
    pub kind: &'static str,
    pub report_id: &'static str,
    pub card_id: &'static str,
    pub data: ChartData,
}

impl ChartCard {
    pub fn new(card: CardKind, rows: Vec<ChartRow>) -> Self {
        Self {
            kind: card.kind(),
            report_id: REPORT_ID,
            card_id: card.card_id(),
            data: ChartData { data: rows },
        }
    }
}

/// Merges per-package series into chart rows.
///
/// Rows follow the dates of the first series; a package without a value on
/// one of those dates gets zero.
pub fn merge_series(series_by_key: &IndexMap<String, DailyValues>) -> Vec<ChartRow> {
    let Some((_, first)) = series_by_key.first() else {
        return Vec::new();
    };

    let lookups: Vec<(&String, IndexMap<NaiveDate, u64>)> = series_by_key
        .iter()
        .map(|(key, values)| (key, values.iter().copied().collect()))
        .collect();

    first
        .iter()
        .map(|(date, _)| {
            let mut row = ChartRow::new();
            row.insert("date".to_string(), Value::from(date.to_string()));
            for (key, values) in &lookups {
                let value = values.get(date).copied().unwrap_or(0);
                row.insert((*key).clone(), Value::from(value));
            }
            row
        })
        .collect()
}

pub fn daily_values(series: &Series) -> DailyValues {
    series
        .points()
        .iter()
        .map(|point| (point.date, point.downloads))
        .collect()
}

fn synthesize(end: NaiveDate, days: u32, profile: SyntheticProfile) -> DailyValues {
    daily_values(&synthetic::series(end, days, profile, &mut rand::rng()))
}

/// Builds the package summary cards from live or mock data
pub struct CardBuilder<'a> {
    resolver: &'a DownloadStatsResolver,
    github: &'a GitHubClient,
    catalog: &'a Catalog,
    mock: bool,
}

impl<'a> CardBuilder<'a> {
    pub fn new(
        resolver: &'a DownloadStatsResolver,
        github: &'a GitHubClient,
        catalog: &'a Catalog,
    ) -> Self {
        Self {
            resolver,
            github,
            catalog,
            mock: false,
        }
    }

    pub fn with_mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }

    fn effective_days(&self, days: u32) -> u32 {
        if self.mock {
            days.max(MOCK_MIN_DAYS)
        } else {
            days.max(1)
        }
    }

    pub async fn build(&self, card: CardKind, days: u32) -> ChartCard {
        let days = self.effective_days(days);
        let rows = match card {
            CardKind::Downloads => merge_series(&self.downloads(days).await),
            CardKind::Commits => merge_series(&self.commits(days).await),
            CardKind::Stars => self.stars(days).await,
        };
        ChartCard::new(card, rows)
    }

    async fn downloads(&self, days: u32) -> IndexMap<String, DailyValues> {
        let today = self.resolver.today();

        if self.mock {
            return self
                .catalog
                .packages()
                .iter()
                .map(|p| {
                    let profile = SyntheticProfile::for_ecosystem(p.ecosystem);
                    (p.key.clone(), synthesize(today, days, profile))
                })
                .collect();
        }

        let resolutions = join_all(self.catalog.packages().iter().map(|p| async move {
            let query = ProviderQuery::new(p.key.as_str(), p.ecosystem, days);
            let resolution = self.resolver.resolve_or_synthesize(&query).await;
            (p.key.clone(), daily_values(&resolution.series))
        }))
        .await;

        resolutions.into_iter().collect()
    }

    async fn commits(&self, days: u32) -> IndexMap<String, DailyValues> {
        let today = self.resolver.today();

        if self.mock {
            return self
                .catalog
                .packages()
                .iter()
                .map(|p| {
                    let base = if repo_of(p).is_some() { 3 } else { 0 };
                    let profile = SyntheticProfile::new(base, 0.01, 3);
                    (p.key.clone(), synthesize(today, days, profile))
                })
                .collect();
        }

        let series = join_all(self.catalog.packages().iter().map(|p| async move {
            let values = match repo_of(p) {
                Some(repo) => match self.github.daily_commits(&repo, days, today).await {
                    Ok(values) => values,
                    Err(e) => {
                        warn!("Using synthetic commit series for {}: {}", p.key, e);
                        synthesize(today, days, SyntheticProfile::new(5, 0.01, 3))
                    }
                },
                None => zero_series(today, days),
            };
            (p.key.clone(), values)
        }))
        .await;

        series.into_iter().collect()
    }

    async fn stars(&self, days: u32) -> Vec<ChartRow> {
        let today = self.resolver.today();

        if self.mock {
            let series: IndexMap<String, DailyValues> = self
                .catalog
                .packages()
                .iter()
                .map(|p| (p.key.clone(), synthesize(today, days, mock_star_profile(p))))
                .collect();
            return merge_series(&series);
        }

        let counts = join_all(self.catalog.packages().iter().map(|p| async move {
            let stars = match repo_of(p) {
                Some(repo) => self.github.stargazers(&repo).await.unwrap_or_else(|e| {
                    warn!("Stargazer lookup failed for {}: {}", p.key, e);
                    0
                }),
                None => 0,
            };
            (p.key.clone(), stars)
        }))
        .await;

        let mut row = ChartRow::new();
        row.insert("date".to_string(), Value::from(today.to_string()));
        for (key, stars) in counts {
            row.insert(key, Value::from(stars));
        }
        vec![row]
    }
}

fn repo_of(package: &PackageEntry) -> Option<RepoRef> {
    package
        .repo
        .as_deref()
        .and_then(|url| RepoRef::parse(url).ok())
}

fn mock_star_profile(package: &PackageEntry) -> SyntheticProfile {
    let base = MOCK_STAR_BASES
        .iter()
        .find(|(key, _)| *key == package.key)
        .map(|(_, base)| *base)
        .unwrap_or(100);
    let growth = match package.ecosystem {
        Ecosystem::Pypi => 0.0005,
        Ecosystem::Npm => 0.001,
    };
    SyntheticProfile::new(base, growth, base / 20)
}

fn zero_series(today: NaiveDate, days: u32) -> DailyValues {
    synthesize(today, days, SyntheticProfile::new(0, 0.0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn merge_series_pads_missing_dates_with_zero() {
        let mut series = IndexMap::new();
        series.insert(
            "a".to_string(),
            vec![(date("2024-01-01"), 1), (date("2024-01-02"), 2)],
        );
        series.insert("b".to_string(), vec![(date("2024-01-02"), 5)]);

        let rows = merge_series(&series);

        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"date": "2024-01-01", "a": 1, "b": 0},
                {"date": "2024-01-02", "a": 2, "b": 5},
            ])
        );
    }

    #[test]
    fn merge_series_of_nothing_is_empty() {
        assert!(merge_series(&IndexMap::new()).is_empty());
    }

    #[test]
    fn chart_rows_keep_package_order() {
        let mut series = IndexMap::new();
        series.insert("zeta".to_string(), vec![(date("2024-01-01"), 1)]);
        series.insert("alpha".to_string(), vec![(date("2024-01-01"), 2)]);

        let rows = merge_series(&series);

        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["date", "zeta", "alpha"]);
    }

    #[test]
    fn chart_card_serializes_envelope() {
        let card = ChartCard::new(CardKind::Stars, Vec::new());

        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "kind": "recharts:bar",
                "report_id": "package_summary",
                "card_id": "packages_likes_bar",
                "data": {"data": []},
            })
        );
    }

    #[test]
    fn zero_series_covers_every_day() {
        let values = zero_series(date("2024-01-03"), 3);

        assert_eq!(
            values,
            vec![
                (date("2024-01-01"), 0),
                (date("2024-01-02"), 0),
                (date("2024-01-03"), 0),
            ]
        );
    }
}
