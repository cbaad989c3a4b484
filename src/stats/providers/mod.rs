//! Upstream source implementations for fetching download counts

pub mod npm;
pub mod pepy;
pub mod pypi;
pub mod pypistats;
pub mod warehouse;

pub use npm::NpmDownloads;
pub use pepy::{Pepy, PepyEndpoint};
pub use pypi::PypiRegistry;
pub use pypistats::{PypiStats, PypiStatsEndpoint};
pub use warehouse::{BigQueryClient, Warehouse, WarehouseSource};
