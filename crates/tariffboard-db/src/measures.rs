//! Database operations for the `tariff_measures` table.

use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `tariff_measures` table.
///
/// List-valued fields (`affected_countries`, `affected_industries`,
/// `tariff_rates`, `extracted_highlights`) are stored as JSON text.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TariffMeasureRow {
    pub id: String,
    pub source_type: String,
    pub source_url: String,
    pub title: String,
    pub publication_date: String,
    pub implementation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub tariff_type: String,
    pub affected_countries: String,
    pub affected_industries: String,
    pub tariff_rates: String,
    pub full_text: String,
    pub extracted_highlights: String,
    pub status: String,
    pub last_updated: String,
}

const MEASURE_COLUMNS: &str = "id, source_type, source_url, title, publication_date, \
     implementation_date, expiration_date, tariff_type, affected_countries, \
     affected_industries, tariff_rates, full_text, extracted_highlights, status, last_updated";

/// Insert or fully replace a tariff measure keyed by `id`.
///
/// Re-collecting the same source item overwrites the row rather than
/// duplicating it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_measure(pool: &SqlitePool, row: &TariffMeasureRow) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO tariff_measures \
           (id, source_type, source_url, title, publication_date, implementation_date, \
            expiration_date, tariff_type, affected_countries, affected_industries, \
            tariff_rates, full_text, extracted_highlights, status, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
         ON CONFLICT(id) DO UPDATE SET \
           source_type = excluded.source_type, \
           source_url = excluded.source_url, \
           title = excluded.title, \
           publication_date = excluded.publication_date, \
           implementation_date = excluded.implementation_date, \
           expiration_date = excluded.expiration_date, \
           tariff_type = excluded.tariff_type, \
           affected_countries = excluded.affected_countries, \
           affected_industries = excluded.affected_industries, \
           tariff_rates = excluded.tariff_rates, \
           full_text = excluded.full_text, \
           extracted_highlights = excluded.extracted_highlights, \
           status = excluded.status, \
           last_updated = excluded.last_updated",
    )
    .bind(&row.id)
    .bind(&row.source_type)
    .bind(&row.source_url)
    .bind(&row.title)
    .bind(&row.publication_date)
    .bind(&row.implementation_date)
    .bind(&row.expiration_date)
    .bind(&row.tariff_type)
    .bind(&row.affected_countries)
    .bind(&row.affected_industries)
    .bind(&row.tariff_rates)
    .bind(&row.full_text)
    .bind(&row.extracted_highlights)
    .bind(&row.status)
    .bind(&row.last_updated)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns the most recent measures, newest publication first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_measures(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<TariffMeasureRow>, DbError> {
    let rows = sqlx::query_as::<_, TariffMeasureRow>(&format!(
        "SELECT {MEASURE_COLUMNS} FROM tariff_measures \
         ORDER BY publication_date DESC, id \
         LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns the total number of stored measures.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_measures(pool: &SqlitePool) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tariff_measures")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
