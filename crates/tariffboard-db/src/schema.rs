//! Schema lifecycle for the four entity tables.
//!
//! `reset_schema` drops and recreates everything. It runs once at pipeline
//! startup, which means historical tariff measures do not survive a process
//! restart. That matches the upstream system's behavior and is deliberately
//! kept; callers must log it loudly rather than hide it.

use sqlx::SqlitePool;

use crate::DbError;

const CREATE_TARIFF_MEASURES: &str = "CREATE TABLE tariff_measures (
    id TEXT PRIMARY KEY,
    source_type TEXT NOT NULL,
    source_url TEXT NOT NULL,
    title TEXT NOT NULL,
    publication_date TEXT NOT NULL,
    implementation_date TEXT,
    expiration_date TEXT,
    tariff_type TEXT NOT NULL,
    affected_countries TEXT NOT NULL,
    affected_industries TEXT NOT NULL,
    tariff_rates TEXT NOT NULL,
    full_text TEXT NOT NULL,
    extracted_highlights TEXT NOT NULL,
    status TEXT NOT NULL,
    last_updated TEXT NOT NULL
)";

const CREATE_COUNTRY_PROFILES: &str = "CREATE TABLE country_profiles (
    country_code TEXT PRIMARY KEY,
    country_name TEXT NOT NULL,
    region TEXT NOT NULL DEFAULT 'Unknown',
    latest_trade_deficit REAL NOT NULL DEFAULT 0,
    trade_deficit_trend TEXT NOT NULL DEFAULT '[]',
    total_exports REAL NOT NULL DEFAULT 0,
    total_imports REAL NOT NULL DEFAULT 0,
    tariff_measures TEXT NOT NULL DEFAULT '[]',
    affected_industries TEXT NOT NULL DEFAULT '[]',
    initial_tariff REAL NOT NULL DEFAULT 0,
    effective_tariff REAL NOT NULL DEFAULT 0,
    supply_chain_risk REAL NOT NULL DEFAULT 0,
    tariff_impact REAL NOT NULL DEFAULT 0,
    jobs_impact REAL NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL
)";

const CREATE_INDUSTRY_PROFILES: &str = "CREATE TABLE industry_profiles (
    industry_code TEXT PRIMARY KEY,
    industry_name TEXT NOT NULL,
    sector TEXT NOT NULL DEFAULT 'Unknown',
    countries_affected TEXT NOT NULL DEFAULT '[]',
    initial_tariff REAL NOT NULL DEFAULT 0,
    effective_tariff REAL NOT NULL DEFAULT 0,
    trade_volume REAL NOT NULL DEFAULT 0,
    gva_impact REAL NOT NULL DEFAULT 0,
    jobs_impact REAL NOT NULL DEFAULT 0,
    gdp_value REAL NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL
)";

const CREATE_ECONOMIC_TIME_SERIES: &str = "CREATE TABLE economic_time_series (
    id TEXT PRIMARY KEY,
    metric TEXT NOT NULL,
    country_code TEXT NOT NULL,
    industry_code TEXT,
    frequency TEXT NOT NULL,
    time_points TEXT NOT NULL,
    values_data TEXT NOT NULL,
    source TEXT NOT NULL,
    last_updated TEXT NOT NULL
)";

const TABLES: &[&str] = &[
    "tariff_measures",
    "country_profiles",
    "industry_profiles",
    "economic_time_series",
];

/// Drop and recreate all four entity tables.
///
/// Destructive: all previously collected rows are lost.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn reset_schema(pool: &SqlitePool) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for table in TABLES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await?;
    }

    for create in [
        CREATE_TARIFF_MEASURES,
        CREATE_COUNTRY_PROFILES,
        CREATE_INDUSTRY_PROFILES,
        CREATE_ECONOMIC_TIME_SERIES,
    ] {
        sqlx::query(create).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Returns `true` if all four entity tables exist.
///
/// Used at startup to distinguish a fresh database from a corrupted one
/// before deciding to reset.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the catalog query fails.
pub async fn schema_is_present(pool: &SqlitePool) -> Result<bool, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master \
         WHERE type = 'table' AND name IN \
           ('tariff_measures', 'country_profiles', 'industry_profiles', 'economic_time_series')",
    )
    .fetch_one(pool)
    .await?;
    Ok(count == i64::try_from(TABLES.len()).unwrap_or(4))
}
