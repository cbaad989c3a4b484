// Download statistics layer
// - types.rs: Common types (DownloadPoint, Series, ProviderQuery)
// - error.rs: Candidate and resolution errors
// - normalize.rs: Shape-tolerant record normalization
// - source.rs: DownloadSource trait and fallback driver
// - resolver.rs: Per-ecosystem resolution
// - synthetic.rs: Synthetic substitute series
// - providers/: Upstream sources
//   - npm.rs: npm registry and downloads API
//   - pypi.rs: PyPI release metadata
//   - pypistats.rs: pypistats.org endpoints
//   - pepy.rs: pepy.tech API
//   - warehouse.rs: BigQuery public download events

pub mod error;
pub mod normalize;
pub mod providers;
pub mod resolver;
pub mod source;
pub mod synthetic;
pub mod types;

pub use error::{NoAuthoritativeData, ProviderError};
pub use resolver::{DownloadStatsResolver, Endpoints, Resolution, SeriesOrigin};
pub use types::{DownloadPoint, Ecosystem, ProviderQuery, RegistryMetadata, Series};
