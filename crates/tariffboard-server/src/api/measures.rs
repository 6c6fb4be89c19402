use axum::{extract::State, Extension, Json};
use serde::Serialize;

use tariffboard_db::TariffMeasureRow;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

const RECENT_MEASURES_LIMIT: i64 = 50;

/// A tariff measure with the JSON list columns decoded for clients.
#[derive(Debug, Serialize)]
pub(super) struct MeasureItem {
    id: String,
    source_type: String,
    source_url: String,
    title: String,
    publication_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    implementation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration_date: Option<String>,
    tariff_type: String,
    affected_countries: Vec<String>,
    affected_industries: Vec<String>,
    tariff_rates: serde_json::Value,
    extracted_highlights: Vec<String>,
    status: String,
    last_updated: String,
}

fn string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

impl From<TariffMeasureRow> for MeasureItem {
    fn from(row: TariffMeasureRow) -> Self {
        let tariff_rates = serde_json::from_str(&row.tariff_rates)
            .unwrap_or_else(|_| serde_json::json!({}));
        Self {
            id: row.id,
            source_type: row.source_type,
            source_url: row.source_url,
            title: row.title,
            publication_date: row.publication_date,
            implementation_date: row.implementation_date,
            expiration_date: row.expiration_date,
            tariff_type: row.tariff_type,
            affected_countries: string_list(&row.affected_countries),
            affected_industries: string_list(&row.affected_industries),
            tariff_rates,
            extracted_highlights: string_list(&row.extracted_highlights),
            status: row.status,
            last_updated: row.last_updated,
        }
    }
}

pub(super) async fn list_measures(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<MeasureItem>>>, ApiError> {
    let rows = tariffboard_db::list_recent_measures(&state.pool, RECENT_MEASURES_LIMIT)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(MeasureItem::from).collect();
    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
