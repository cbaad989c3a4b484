use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use pkgstats::config::{self, ProviderConfig};
use pkgstats::report::{CardBuilder, CardKind, Catalog, GitHubClient, github};
use pkgstats::stats::{DownloadStatsResolver, Ecosystem, ProviderQuery};

#[derive(Debug, Parser)]
#[command(name = "pkgstats", version, about = "Per-day package download statistics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the per-day download series of one package
    Downloads {
        /// Package name or catalog key
        package: String,

        #[arg(long, default_value = "npm")]
        ecosystem: Ecosystem,

        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Render one package summary card
    Card {
        #[arg(value_enum)]
        card: CardArg,

        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Build the card from synthetic data only
        #[arg(long, env = "USE_MOCK_DATA")]
        mock: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CardArg {
    Downloads,
    Commits,
    Stars,
}

impl From<CardArg> for CardKind {
    fn from(card: CardArg) -> Self {
        match card {
            CardArg::Downloads => CardKind::Downloads,
            CardArg::Commits => CardKind::Commits,
            CardArg::Stars => CardKind::Stars,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = pkgstats::log::init()?;
    info!("Starting pkgstats, logging to {:?}", config::log_path());

    let provider_config = ProviderConfig::from_env();
    let catalog = Catalog::default();
    let resolver =
        DownloadStatsResolver::new(provider_config.clone()).with_aliases(catalog.aliases());

    let output = match cli.command {
        Command::Downloads {
            package,
            ecosystem,
            days,
        } => {
            let query = ProviderQuery::new(package, ecosystem, days);
            let resolution = resolver.resolve_or_synthesize(&query).await;
            info!(
                "Resolved {} points for {} ({:?})",
                resolution.series.len(),
                query.package_identifier,
                resolution.origin
            );
            serde_json::to_string_pretty(&resolution.series)?
        }
        Command::Card { card, days, mock } => {
            let github =
                GitHubClient::new(github::DEFAULT_BASE_URL, provider_config.github_token.clone())?;
            let card = CardBuilder::new(&resolver, &github, &catalog)
                .with_mock(mock)
                .build(card.into(), days)
                .await;
            serde_json::to_string_pretty(&card)?
        }
    };

    println!("{}", output);
    Ok(())
}
