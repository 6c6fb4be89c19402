//! Database operations for the `economic_time_series` table.
//!
//! Series rows are snapshots, not append logs: each collection cycle fully
//! replaces the row for a given id.

use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `economic_time_series` table.
///
/// `time_points` and `values_data` are JSON arrays of equal length, aligned
/// by index and sorted ascending by period label.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EconomicTimeSeriesRow {
    pub id: String,
    pub metric: String,
    pub country_code: String,
    pub industry_code: Option<String>,
    pub frequency: String,
    pub time_points: String,
    pub values_data: String,
    pub source: String,
    pub last_updated: String,
}

/// Insert or fully replace a series row keyed by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_series(pool: &SqlitePool, row: &EconomicTimeSeriesRow) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO economic_time_series \
           (id, metric, country_code, industry_code, frequency, time_points, \
            values_data, source, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT(id) DO UPDATE SET \
           metric = excluded.metric, \
           country_code = excluded.country_code, \
           industry_code = excluded.industry_code, \
           frequency = excluded.frequency, \
           time_points = excluded.time_points, \
           values_data = excluded.values_data, \
           source = excluded.source, \
           last_updated = excluded.last_updated",
    )
    .bind(&row.id)
    .bind(&row.metric)
    .bind(&row.country_code)
    .bind(&row.industry_code)
    .bind(&row.frequency)
    .bind(&row.time_points)
    .bind(&row.values_data)
    .bind(&row.source)
    .bind(&row.last_updated)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns all series rows for one country, ordered by metric name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_series_for_country(
    pool: &SqlitePool,
    country_code: &str,
) -> Result<Vec<EconomicTimeSeriesRow>, DbError> {
    let rows = sqlx::query_as::<_, EconomicTimeSeriesRow>(
        "SELECT id, metric, country_code, industry_code, frequency, time_points, \
                values_data, source, last_updated \
         FROM economic_time_series \
         WHERE country_code = ?1 \
         ORDER BY metric",
    )
    .bind(country_code)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
