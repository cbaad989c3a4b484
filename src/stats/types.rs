//! Common types for download statistics

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Package distribution system a package is published to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Pypi,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ecosystem::Npm => f.write_str("npm"),
            Ecosystem::Pypi => f.write_str("pypi"),
        }
    }
}

impl FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "npm" => Ok(Ecosystem::Npm),
            "pypi" => Ok(Ecosystem::Pypi),
            other => Err(format!("unknown ecosystem: {}", other)),
        }
    }
}

/// Downloads of one package on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPoint {
    pub date: NaiveDate,
    pub downloads: u64,
}

impl DownloadPoint {
    pub fn new(date: NaiveDate, downloads: u64) -> Self {
        Self { date, downloads }
    }
}

/// Per-day download series, strictly ascending by date with unique dates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Series(Vec<DownloadPoint>);

impl Series {
    /// Builds a series from raw `(date, count)` observations.
    ///
    /// Observations are sorted by date, counts of the same date are summed
    /// and negative counts are clamped to zero.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, i64)>,
    {
        let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for (date, count) in observations {
            let count = u64::try_from(count).unwrap_or(0);
            let slot = by_date.entry(date).or_insert(0);
            *slot = slot.saturating_add(count);
        }

        Self(
            by_date
                .into_iter()
                .map(|(date, downloads)| DownloadPoint::new(date, downloads))
                .collect(),
        )
    }

    /// Builds a series from already validated points
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = DownloadPoint>,
    {
        Self::from_observations(points.into_iter().map(|p| {
            (p.date, i64::try_from(p.downloads).unwrap_or(i64::MAX))
        }))
    }

    /// Keeps only the `days` most recent points
    pub fn truncate_to_recent(mut self, days: usize) -> Self {
        if self.0.len() > days {
            let excess = self.0.len() - days;
            self.0.drain(..excess);
        }
        self
    }

    pub fn points(&self) -> &[DownloadPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.0.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.0.last().map(|p| p.date)
    }

    pub fn into_points(self) -> Vec<DownloadPoint> {
        self.0
    }
}

/// Input to one resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuery {
    /// Package name or catalog alias (e.g. "cereon-dashboard")
    pub package_identifier: String,
    pub ecosystem: Ecosystem,
    /// Number of most recent days requested; always at least 1
    pub window_days: u32,
    /// npm: bearer token for the registry. PyPI: downloads-service API key.
    pub registry_token: Option<String>,
}

impl ProviderQuery {
    pub fn new(package_identifier: impl Into<String>, ecosystem: Ecosystem, window_days: u32) -> Self {
        Self {
            package_identifier: package_identifier.into(),
            ecosystem,
            window_days: window_days.max(1),
            registry_token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.registry_token = token;
        self
    }

    pub fn window_len(&self) -> usize {
        self.window_days as usize
    }
}

/// Registry-derived facts used to widen the requested window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryMetadata {
    /// Earliest publish/upload date that is not in the future
    pub earliest_date: Option<NaiveDate>,
}
