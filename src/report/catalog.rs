//! Packages shown on the package summary report

use std::collections::HashMap;

use crate::stats::types::Ecosystem;

/// One package tracked by the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Chart key, also used as the column name in chart rows
    pub key: String,
    /// Name under which the package is published
    pub registry_name: String,
    pub ecosystem: Ecosystem,
    /// Source repository URL
    pub repo: Option<String>,
}

impl PackageEntry {
    pub fn new(key: &str, registry_name: &str, ecosystem: Ecosystem, repo: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            registry_name: registry_name.to_string(),
            ecosystem,
            repo: repo.map(str::to_string),
        }
    }
}

/// Ordered set of tracked packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    packages: Vec<PackageEntry>,
}

impl Catalog {
    pub fn new(packages: Vec<PackageEntry>) -> Self {
        Self { packages }
    }

    pub fn packages(&self) -> &[PackageEntry] {
        &self.packages
    }

    pub fn get(&self, key: &str) -> Option<&PackageEntry> {
        self.packages.iter().find(|p| p.key == key)
    }

    /// Chart keys that differ from their registry name
    pub fn aliases(&self) -> HashMap<String, String> {
        self.packages
            .iter()
            .filter(|p| p.key != p.registry_name)
            .map(|p| (p.key.clone(), p.registry_name.clone()))
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            PackageEntry::new(
                "cereon-dashboard",
                "@cereon/dashboard",
                Ecosystem::Npm,
                Some("https://github.com/adimis-ai/cereon-dashboard"),
            ),
            PackageEntry::new(
                "cereon-recharts",
                "@cereon/recharts",
                Ecosystem::Npm,
                Some("https://github.com/adimis-ai/cereon-recharts"),
            ),
            PackageEntry::new(
                "cereon-sdk",
                "cereon-sdk",
                Ecosystem::Pypi,
                Some("https://github.com/adimis-ai/cereon-sdk"),
            ),
        ])
    }
}
