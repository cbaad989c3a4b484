//! Report layer
//! - catalog.rs: Tracked packages and their registry names
//! - github.rs: GitHub commits and stargazers
//! - cards.rs: Chart card builders and cross-package merge

pub mod catalog;
pub mod cards;
pub mod github;

pub use cards::{CardBuilder, CardKind, ChartCard};
pub use catalog::{Catalog, PackageEntry};
pub use github::{GitHubClient, RepoRef};
