use thiserror::Error;

use crate::stats::types::Ecosystem;

/// Failure of a single candidate source
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Source not applicable: {0}")]
    NotApplicable(&'static str),

    #[error("Warehouse query failed: {0}")]
    Warehouse(String),
}

impl ProviderError {
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, ProviderError::NotApplicable(_))
    }
}

/// Every candidate for a package failed or returned no data
#[derive(Debug, Error)]
#[error("Unable to obtain per-day {ecosystem} download counts for package '{package}'")]
pub struct NoAuthoritativeData {
    pub package: String,
    pub ecosystem: Ecosystem,
    #[source]
    pub cause: Option<ProviderError>,
}
