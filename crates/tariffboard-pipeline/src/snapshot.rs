//! Dashboard snapshot: the denormalized JSON document the API serves.
//!
//! Built from store aggregates at the end of each cycle and written with a
//! temp-file + rename so readers never observe a half-written document. All
//! queries behind the builder carry total orderings, so two builds over the
//! same store produce byte-identical output.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::CycleError;

const DETAIL_TABLE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatmapEntry {
    pub country_code: String,
    pub country_name: String,
    pub region: String,
    pub trade_deficit: f64,
    pub exports: f64,
    pub imports: f64,
    pub supply_chain_risk: f64,
    pub tariff_impact: f64,
    pub jobs_impact: f64,
    /// The field map renderers color by; mirrors `tariff_impact`.
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectorSlice {
    pub sector: String,
    pub trade_volume: f64,
    pub average_tariff: f64,
    pub jobs_impact: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSeriesPoint {
    pub year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_deficit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imports: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountryDetail {
    pub country_code: String,
    pub country_name: String,
    pub initial_tariff: f64,
    pub effective_tariff: f64,
    pub tariff_impact: f64,
    pub jobs_impact: f64,
    pub supply_chain_risk: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndustryDetail {
    pub industry_code: String,
    pub industry_name: String,
    pub sector: String,
    pub initial_tariff: f64,
    pub effective_tariff: f64,
    pub gva_impact: f64,
    pub jobs_impact: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailTable {
    pub countries: Vec<CountryDetail>,
    pub industries: Vec<IndustryDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMetadata {
    pub generated_at: String,
    /// Names of the sources that actually contributed this cycle.
    pub data_sources: Vec<String>,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSnapshot {
    pub heatmap_data: Vec<HeatmapEntry>,
    pub sector_data: Vec<SectorSlice>,
    pub time_series: Vec<TimeSeriesPoint>,
    pub detail_table: DetailTable,
    pub metadata: SnapshotMetadata,
}

/// Builds the full snapshot from current store contents.
///
/// # Errors
///
/// Returns [`CycleError::Db`] if any aggregate query fails.
pub async fn build_snapshot(
    pool: &SqlitePool,
    data_sources: Vec<String>,
    now: &str,
) -> Result<DashboardSnapshot, CycleError> {
    Ok(DashboardSnapshot {
        heatmap_data: build_heatmap(pool).await?,
        sector_data: build_sectors(pool).await?,
        time_series: build_time_series(pool).await?,
        detail_table: build_detail_table(pool).await?,
        metadata: SnapshotMetadata {
            generated_at: now.to_string(),
            data_sources,
            last_updated: now.to_string(),
        },
    })
}

async fn build_heatmap(pool: &SqlitePool) -> Result<Vec<HeatmapEntry>, CycleError> {
    let profiles = tariffboard_db::list_country_profiles(pool).await?;
    Ok(profiles
        .into_iter()
        .map(|p| {
            // Strip the source prefix for display: "WTO_China" -> "China",
            // "CTY_10" -> "10".
            let display_code = p
                .country_code
                .rsplit('_')
                .next()
                .unwrap_or(&p.country_code)
                .to_string();
            HeatmapEntry {
                country_code: display_code,
                country_name: p.country_name,
                region: p.region,
                trade_deficit: p.latest_trade_deficit,
                exports: p.total_exports,
                imports: p.total_imports,
                supply_chain_risk: p.supply_chain_risk,
                tariff_impact: p.tariff_impact,
                jobs_impact: p.jobs_impact,
                value: p.tariff_impact,
            }
        })
        .collect())
}

async fn build_sectors(pool: &SqlitePool) -> Result<Vec<SectorSlice>, CycleError> {
    let rollup = tariffboard_db::sector_rollup(pool).await?;
    let mut slices: Vec<SectorSlice> = rollup
        .into_iter()
        .filter(|r| !r.sector.is_empty() && r.sector != "Unknown")
        .map(|r| SectorSlice {
            sector: r.sector,
            trade_volume: r.total_volume,
            average_tariff: r.avg_tariff,
            jobs_impact: r.total_jobs_impact,
            percentage: 0.0,
        })
        .collect();

    // Percentages are shares of the retained sectors, not of the whole table.
    let total: f64 = slices.iter().map(|s| s.trade_volume).sum();
    let total = if total == 0.0 { 1.0 } else { total };
    for slice in &mut slices {
        slice.percentage = slice.trade_volume / total * 100.0;
    }
    Ok(slices)
}

async fn build_time_series(pool: &SqlitePool) -> Result<Vec<TimeSeriesPoint>, CycleError> {
    let rows = tariffboard_db::list_series_for_country(pool, "USA").await?;

    let mut by_metric: std::collections::HashMap<String, Vec<(String, f64)>> =
        std::collections::HashMap::new();
    for row in rows {
        let years: Vec<String> = match serde_json::from_str(&row.time_points) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(metric = row.metric, error = %e, "bad time_points JSON, skipping series");
                continue;
            }
        };
        let values: Vec<f64> = match serde_json::from_str(&row.values_data) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(metric = row.metric, error = %e, "bad values_data JSON, skipping series");
                continue;
            }
        };
        by_metric.insert(row.metric, years.into_iter().zip(values).collect());
    }

    // trade_deficit anchors the pivot: years it lacks do not appear at all.
    let Some(anchor) = by_metric.get("trade_deficit") else {
        return Ok(Vec::new());
    };

    let lookup = |metric: &str, year: &str| -> Option<f64> {
        by_metric
            .get(metric)
            .and_then(|series| series.iter().find(|(y, _)| y == year))
            .map(|(_, v)| *v)
    };

    Ok(anchor
        .iter()
        .map(|(year, deficit)| TimeSeriesPoint {
            year: year.clone(),
            trade_deficit: Some(*deficit),
            exports: lookup("exports", year),
            imports: lookup("imports", year),
        })
        .collect())
}

async fn build_detail_table(pool: &SqlitePool) -> Result<DetailTable, CycleError> {
    let countries = tariffboard_db::top_countries_by_effective_tariff(pool, DETAIL_TABLE_LIMIT)
        .await?
        .into_iter()
        .map(|p| CountryDetail {
            country_code: p.country_code,
            country_name: p.country_name,
            initial_tariff: p.initial_tariff,
            effective_tariff: p.effective_tariff,
            tariff_impact: p.tariff_impact,
            jobs_impact: p.jobs_impact,
            supply_chain_risk: p.supply_chain_risk,
        })
        .collect();

    let industries = tariffboard_db::top_industries_by_effective_tariff(pool, DETAIL_TABLE_LIMIT)
        .await?
        .into_iter()
        .map(|p| IndustryDetail {
            industry_code: p.industry_code,
            industry_name: p.industry_name,
            sector: p.sector,
            initial_tariff: p.initial_tariff,
            effective_tariff: p.effective_tariff,
            gva_impact: p.gva_impact,
            jobs_impact: p.jobs_impact,
        })
        .collect();

    Ok(DetailTable {
        countries,
        industries,
    })
}

/// Writes the snapshot to `path` atomically (temp file in the same directory,
/// then rename).
///
/// # Errors
///
/// Returns [`CycleError::SnapshotEncode`] if serialization fails, or
/// [`CycleError::SnapshotWrite`] on any filesystem failure.
pub async fn write_snapshot(snapshot: &DashboardSnapshot, path: &Path) -> Result<(), CycleError> {
    let encoded = serde_json::to_vec_pretty(snapshot)?;

    let write_err = |source: std::io::Error| CycleError::SnapshotWrite {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &encoded)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_err)?;

    tracing::info!(path = %path.display(), bytes = encoded.len(), "dashboard snapshot written");
    Ok(())
}

/// Reads a previously written snapshot, `None` when the file does not exist.
///
/// # Errors
///
/// Returns [`CycleError::SnapshotWrite`] on read failure other than absence,
/// or [`CycleError::SnapshotEncode`] if the file holds invalid JSON.
pub async fn read_snapshot(path: &Path) -> Result<Option<DashboardSnapshot>, CycleError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CycleError::SnapshotWrite {
                path: path.display().to_string(),
                source: e,
            });
        }
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}
