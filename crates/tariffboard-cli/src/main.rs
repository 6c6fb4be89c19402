mod run;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tariffboard-cli")]
#[command(about = "Tariff dashboard pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one full collection cycle: all sources, derived metrics, snapshot.
    Cycle,
    /// Collect a single source and persist its records (no snapshot rebuild).
    Collect {
        /// Source name: "White House", "News API", "Census", "BEA", or "WTO".
        #[arg(long)]
        source: String,
    },
    /// Rebuild the dashboard snapshot from current store contents.
    Snapshot,
    /// Print store row counts and the snapshot location.
    Status,
    /// Drop and recreate the schema (destructive).
    ResetDb {
        /// Confirm the destructive reset.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = tariffboard_core::load_app_config()?;
    let pool_config = tariffboard_db::PoolConfig::from_app_config(&config);
    let pool = tariffboard_db::connect_pool(&config.database_url, pool_config).await?;

    match cli.command {
        Commands::Cycle => run::run_cycle(pool, &config).await,
        Commands::Collect { source } => run::run_single_source(pool, &config, &source).await,
        Commands::Snapshot => run::rebuild_snapshot(pool, &config).await,
        Commands::Status => run::print_status(pool, &config).await,
        Commands::ResetDb { yes } => run::reset_db(pool, yes).await,
    }
}
