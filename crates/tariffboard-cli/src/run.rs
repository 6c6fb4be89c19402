//! Command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established. Collection reuses the same orchestrator as the server, so a
//! CLI run and a server cycle behave identically.

use chrono::Utc;
use sqlx::SqlitePool;

use tariffboard_core::AppConfig;
use tariffboard_pipeline::{clients_from_config, snapshot, Orchestrator};

const SOURCE_NAMES: &[&str] = &["White House", "News API", "Census", "BEA", "WTO"];

async fn ensure_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    if !tariffboard_db::schema_is_present(pool).await? {
        tracing::warn!("schema missing or incomplete, rebuilding (drops existing tables)");
        tariffboard_db::reset_schema(pool).await?;
    }
    Ok(())
}

fn print_report(report: &tariffboard_pipeline::CycleReport) {
    for status in &report.source_status {
        if status.ok {
            println!("  {:<12} ok  ({} records)", status.name, status.records_written);
        } else {
            println!(
                "  {:<12} FAILED  {}",
                status.name,
                status.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!("measures written: {}", report.measures_written);
}

/// `cycle`: one full collection cycle, identical to the scheduled daily run.
pub(crate) async fn run_cycle(pool: SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let collectors = clients_from_config(config)?;
    let orchestrator = Orchestrator::new(pool, collectors, config.snapshot_path());

    let report = orchestrator.run_full_cycle().await?;
    print_report(&report);
    println!("snapshot: {}", config.snapshot_path().display());
    Ok(())
}

/// `collect --source <name>`: one source, persisted without a snapshot rebuild.
pub(crate) async fn run_single_source(
    pool: SqlitePool,
    config: &AppConfig,
    source: &str,
) -> anyhow::Result<()> {
    if !SOURCE_NAMES.contains(&source) {
        anyhow::bail!("unknown source '{source}'; expected one of {SOURCE_NAMES:?}");
    }

    ensure_schema(&pool).await?;
    let collectors = clients_from_config(config)?;
    if !collectors.iter().any(|c| c.name() == source) {
        anyhow::bail!("source '{source}' is disabled; set its API key to enable it");
    }
    let orchestrator = Orchestrator::new(pool, collectors, config.snapshot_path());

    let report = orchestrator.run_sources(&[source]).await?;
    print_report(&report);
    Ok(())
}

/// `snapshot`: rebuild the published artifact from whatever is in the store.
pub(crate) async fn rebuild_snapshot(pool: SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let data_sources: Vec<String> = clients_from_config(config)?
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let now = Utc::now().to_rfc3339();
    let dashboard = snapshot::build_snapshot(&pool, data_sources, &now).await?;
    let path = config.snapshot_path();
    snapshot::write_snapshot(&dashboard, &path).await?;
    println!(
        "snapshot written to {} ({} heatmap rows, {} sectors)",
        path.display(),
        dashboard.heatmap_data.len(),
        dashboard.sector_data.len()
    );
    Ok(())
}

/// `status`: row counts and snapshot freshness.
pub(crate) async fn print_status(pool: SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    if !tariffboard_db::schema_is_present(&pool).await? {
        println!("schema: not initialised (run `tariffboard-cli reset-db --yes`)");
        return Ok(());
    }

    let measures = tariffboard_db::count_measures(&pool).await?;
    let countries = tariffboard_db::list_country_profiles(&pool).await?.len();
    let industries = tariffboard_db::list_industry_profiles(&pool).await?.len();
    println!("measures:   {measures}");
    println!("countries:  {countries}");
    println!("industries: {industries}");

    let path = config.snapshot_path();
    match snapshot::read_snapshot(&path).await? {
        Some(dashboard) => println!(
            "snapshot:   {} (generated {})",
            path.display(),
            dashboard.metadata.generated_at
        ),
        None => println!("snapshot:   {} (not generated yet)", path.display()),
    }
    Ok(())
}

/// `reset-db --yes`: drop and recreate every table.
pub(crate) async fn reset_db(pool: SqlitePool, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to reset without --yes; this drops all collected data");
    }
    tariffboard_db::reset_schema(&pool).await?;
    println!("schema reset complete");
    Ok(())
}
