//! Database operations for the `country_profiles` table.
//!
//! Country codes carry a source prefix (`CTY_` for Census districts, `BEA_`,
//! `WTO_`). The same real-world country can legitimately appear under more
//! than one code; no identity resolution happens at this layer.

use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `country_profiles` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CountryProfileRow {
    pub country_code: String,
    pub country_name: String,
    pub region: String,
    pub latest_trade_deficit: f64,
    pub trade_deficit_trend: String,
    pub total_exports: f64,
    pub total_imports: f64,
    pub tariff_measures: String,
    pub affected_industries: String,
    pub initial_tariff: f64,
    pub effective_tariff: f64,
    pub supply_chain_risk: f64,
    pub tariff_impact: f64,
    pub jobs_impact: f64,
    pub last_updated: String,
}

const COUNTRY_COLUMNS: &str = "country_code, country_name, region, latest_trade_deficit, \
     trade_deficit_trend, total_exports, total_imports, tariff_measures, affected_industries, \
     initial_tariff, effective_tariff, supply_chain_risk, tariff_impact, jobs_impact, last_updated";

/// Insert or fully replace a country profile keyed by `country_code`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_country_profile(
    pool: &SqlitePool,
    row: &CountryProfileRow,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO country_profiles \
           (country_code, country_name, region, latest_trade_deficit, trade_deficit_trend, \
            total_exports, total_imports, tariff_measures, affected_industries, initial_tariff, \
            effective_tariff, supply_chain_risk, tariff_impact, jobs_impact, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
         ON CONFLICT(country_code) DO UPDATE SET \
           country_name = excluded.country_name, \
           region = excluded.region, \
           latest_trade_deficit = excluded.latest_trade_deficit, \
           trade_deficit_trend = excluded.trade_deficit_trend, \
           total_exports = excluded.total_exports, \
           total_imports = excluded.total_imports, \
           tariff_measures = excluded.tariff_measures, \
           affected_industries = excluded.affected_industries, \
           initial_tariff = excluded.initial_tariff, \
           effective_tariff = excluded.effective_tariff, \
           supply_chain_risk = excluded.supply_chain_risk, \
           tariff_impact = excluded.tariff_impact, \
           jobs_impact = excluded.jobs_impact, \
           last_updated = excluded.last_updated",
    )
    .bind(&row.country_code)
    .bind(&row.country_name)
    .bind(&row.region)
    .bind(row.latest_trade_deficit)
    .bind(&row.trade_deficit_trend)
    .bind(row.total_exports)
    .bind(row.total_imports)
    .bind(&row.tariff_measures)
    .bind(&row.affected_industries)
    .bind(row.initial_tariff)
    .bind(row.effective_tariff)
    .bind(row.supply_chain_risk)
    .bind(row.tariff_impact)
    .bind(row.jobs_impact)
    .bind(&row.last_updated)
    .execute(pool)
    .await?;
    Ok(())
}

/// Sets `initial_tariff` for a country, inserting a default-valued profile
/// if one does not exist yet.
///
/// This is the WTO merge path: only the tariff field is touched on an
/// existing row so data contributed by other sources is not clobbered.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a statement fails.
pub async fn set_country_initial_tariff(
    pool: &SqlitePool,
    country_code: &str,
    country_name: &str,
    initial_tariff: f64,
    now: &str,
) -> Result<(), DbError> {
    let updated = sqlx::query(
        "UPDATE country_profiles \
         SET initial_tariff = ?1, last_updated = ?2 \
         WHERE country_code = ?3",
    )
    .bind(initial_tariff)
    .bind(now)
    .bind(country_code)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO country_profiles \
               (country_code, country_name, region, initial_tariff, last_updated) \
             VALUES (?1, ?2, 'Unknown', ?3, ?4)",
        )
        .bind(country_code)
        .bind(country_name)
        .bind(initial_tariff)
        .bind(now)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Sets `latest_trade_deficit` for a country, inserting a default-valued
/// profile (with the trend seeded from the single value) if absent.
///
/// This is the BEA merge path; the secondary `BEA_` key prefix keeps it from
/// clobbering Census district rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a statement fails.
pub async fn set_country_trade_deficit(
    pool: &SqlitePool,
    country_code: &str,
    country_name: &str,
    balance: f64,
    trend_json: &str,
    now: &str,
) -> Result<(), DbError> {
    let updated = sqlx::query(
        "UPDATE country_profiles \
         SET latest_trade_deficit = ?1, last_updated = ?2 \
         WHERE country_code = ?3",
    )
    .bind(balance)
    .bind(now)
    .bind(country_code)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO country_profiles \
               (country_code, country_name, region, latest_trade_deficit, \
                trade_deficit_trend, last_updated) \
             VALUES (?1, ?2, 'Unknown', ?3, ?4, ?5)",
        )
        .bind(country_code)
        .bind(country_name)
        .bind(balance)
        .bind(trend_json)
        .bind(now)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Writes derived metrics back onto a country row.
///
/// Only the metrics engine calls this; collectors never set these fields.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn update_country_derived_metrics(
    pool: &SqlitePool,
    country_code: &str,
    supply_chain_risk: f64,
    tariff_impact: f64,
    now: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE country_profiles \
         SET supply_chain_risk = ?1, tariff_impact = ?2, last_updated = ?3 \
         WHERE country_code = ?4",
    )
    .bind(supply_chain_risk)
    .bind(tariff_impact)
    .bind(now)
    .bind(country_code)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns all country profiles ordered by `country_code` for deterministic
/// downstream output.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_country_profiles(pool: &SqlitePool) -> Result<Vec<CountryProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, CountryProfileRow>(&format!(
        "SELECT {COUNTRY_COLUMNS} FROM country_profiles ORDER BY country_code"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns the top `limit` countries by `effective_tariff`, ties broken by
/// `country_code` so repeated runs produce identical output.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_countries_by_effective_tariff(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<CountryProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, CountryProfileRow>(&format!(
        "SELECT {COUNTRY_COLUMNS} FROM country_profiles \
         ORDER BY effective_tariff DESC, country_code \
         LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
