//! Database operations for the `industry_profiles` table.

use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `industry_profiles` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct IndustryProfileRow {
    pub industry_code: String,
    pub industry_name: String,
    pub sector: String,
    pub countries_affected: String,
    pub initial_tariff: f64,
    pub effective_tariff: f64,
    pub trade_volume: f64,
    pub gva_impact: f64,
    pub jobs_impact: f64,
    pub gdp_value: f64,
    pub last_updated: String,
}

/// One sector's aggregated slice of the industry table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SectorRollupRow {
    pub sector: String,
    pub total_volume: f64,
    pub avg_tariff: f64,
    pub total_jobs_impact: f64,
}

const INDUSTRY_COLUMNS: &str = "industry_code, industry_name, sector, countries_affected, \
     initial_tariff, effective_tariff, trade_volume, gva_impact, jobs_impact, gdp_value, \
     last_updated";

/// Insert or fully replace an industry profile keyed by `industry_code`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_industry_profile(
    pool: &SqlitePool,
    row: &IndustryProfileRow,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO industry_profiles \
           (industry_code, industry_name, sector, countries_affected, initial_tariff, \
            effective_tariff, trade_volume, gva_impact, jobs_impact, gdp_value, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
         ON CONFLICT(industry_code) DO UPDATE SET \
           industry_name = excluded.industry_name, \
           sector = excluded.sector, \
           countries_affected = excluded.countries_affected, \
           initial_tariff = excluded.initial_tariff, \
           effective_tariff = excluded.effective_tariff, \
           trade_volume = excluded.trade_volume, \
           gva_impact = excluded.gva_impact, \
           jobs_impact = excluded.jobs_impact, \
           gdp_value = excluded.gdp_value, \
           last_updated = excluded.last_updated",
    )
    .bind(&row.industry_code)
    .bind(&row.industry_name)
    .bind(&row.sector)
    .bind(&row.countries_affected)
    .bind(row.initial_tariff)
    .bind(row.effective_tariff)
    .bind(row.trade_volume)
    .bind(row.gva_impact)
    .bind(row.jobs_impact)
    .bind(row.gdp_value)
    .bind(&row.last_updated)
    .execute(pool)
    .await?;
    Ok(())
}

/// Sets `gdp_value` for an industry, inserting a default-valued profile
/// (sector `Unknown`) if one does not exist.
///
/// BEA merge path: analogous to the country-side tariff/deficit setters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a statement fails.
pub async fn set_industry_gdp_value(
    pool: &SqlitePool,
    industry_code: &str,
    industry_name: &str,
    gdp_value: f64,
    now: &str,
) -> Result<(), DbError> {
    let updated = sqlx::query(
        "UPDATE industry_profiles \
         SET gdp_value = ?1, last_updated = ?2 \
         WHERE industry_code = ?3",
    )
    .bind(gdp_value)
    .bind(now)
    .bind(industry_code)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO industry_profiles \
               (industry_code, industry_name, sector, gdp_value, last_updated) \
             VALUES (?1, ?2, 'Unknown', ?3, ?4)",
        )
        .bind(industry_code)
        .bind(industry_name)
        .bind(gdp_value)
        .bind(now)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Writes the derived `jobs_impact` back onto an industry row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn update_industry_jobs_impact(
    pool: &SqlitePool,
    industry_code: &str,
    jobs_impact: f64,
    now: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE industry_profiles \
         SET jobs_impact = ?1, last_updated = ?2 \
         WHERE industry_code = ?3",
    )
    .bind(jobs_impact)
    .bind(now)
    .bind(industry_code)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns all industry profiles ordered by `industry_code`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_industry_profiles(pool: &SqlitePool) -> Result<Vec<IndustryProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, IndustryProfileRow>(&format!(
        "SELECT {INDUSTRY_COLUMNS} FROM industry_profiles ORDER BY industry_code"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Groups industries by sector, summing volume and jobs impact and averaging
/// the effective tariff.
///
/// All sectors are returned, `Unknown` included; the snapshot builder decides
/// what to exclude. Ordered by volume descending, then sector name so ties
/// are stable.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sector_rollup(pool: &SqlitePool) -> Result<Vec<SectorRollupRow>, DbError> {
    let rows = sqlx::query_as::<_, SectorRollupRow>(
        "SELECT sector, \
                SUM(trade_volume) AS total_volume, \
                AVG(effective_tariff) AS avg_tariff, \
                SUM(jobs_impact) AS total_jobs_impact \
         FROM industry_profiles \
         GROUP BY sector \
         ORDER BY total_volume DESC, sector",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns the top `limit` industries by `effective_tariff`, ties broken by
/// `industry_code`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_industries_by_effective_tariff(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<IndustryProfileRow>, DbError> {
    let rows = sqlx::query_as::<_, IndustryProfileRow>(&format!(
        "SELECT {INDUSTRY_COLUMNS} FROM industry_profiles \
         ORDER BY effective_tariff DESC, industry_code \
         LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
