mod cycles;
mod dashboard;
mod measures;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use tariffboard_pipeline::{CycleReport, Orchestrator};

use crate::middleware::{request_id, RequestId};

pub use dashboard::SnapshotCache;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub orchestrator: Arc<Orchestrator>,
    pub snapshots: SnapshotCache,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &tariffboard_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/heatmap", get(dashboard::get_heatmap))
        .route("/api/sectors", get(dashboard::get_sectors))
        .route("/api/timeseries", get(dashboard::get_time_series))
        .route("/api/table", get(dashboard::get_detail_table))
        .route("/api/countries", get(dashboard::get_countries))
        .route("/api/industries", get(dashboard::get_industries))
        .route("/api/measures", get(measures::list_measures))
        .route("/api/update", post(cycles::trigger_update))
        .route("/api/refresh", post(cycles::trigger_refresh))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_cycle: Option<CycleReport>,
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let last_cycle = state.orchestrator.last_report().await;

    match tariffboard_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    last_cycle,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        last_cycle,
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;

    use tariffboard_db::reset_schema;
    use tariffboard_pipeline::snapshot::{
        write_snapshot, DashboardSnapshot, DetailTable, SnapshotMetadata,
    };

    async fn test_state(tag: &str) -> (AppState, PathBuf) {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        reset_schema(&pool).await.expect("schema");

        let path = std::env::temp_dir()
            .join(format!("tariffboard-api-{}-{tag}", std::process::id()))
            .join("dashboard_data.json");
        let state = AppState {
            pool: pool.clone(),
            orchestrator: Arc::new(Orchestrator::new(pool, Vec::new(), path.clone())),
            snapshots: SnapshotCache::new(path.clone(), Duration::from_secs(60)),
        };
        (state, path)
    }

    fn empty_snapshot() -> DashboardSnapshot {
        DashboardSnapshot {
            heatmap_data: Vec::new(),
            sector_data: Vec::new(),
            time_series: Vec::new(),
            detail_table: DetailTable {
                countries: Vec::new(),
                industries: Vec::new(),
            },
            metadata: SnapshotMetadata {
                generated_at: "2025-01-01T00:00:00Z".to_string(),
                data_sources: vec!["WTO".to_string()],
                last_updated: "2025-01-01T00:00:00Z".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn health_reports_ok_with_reachable_database() {
        let (state, _path) = test_state("health").await;
        let app = build_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn dashboard_returns_404_before_first_snapshot() {
        let (state, _path) = test_state("missing").await;
        let app = build_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/dashboard")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
    }

    #[tokio::test]
    async fn heatmap_serves_published_snapshot_slice() {
        let (state, path) = test_state("heatmap").await;
        write_snapshot(&empty_snapshot(), &path)
            .await
            .expect("snapshot written");

        let app = build_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/heatmap")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert!(json["data"].as_array().expect("data array").is_empty());

        tokio::fs::remove_dir_all(path.parent().unwrap()).await.ok();
    }

    #[tokio::test]
    async fn update_trigger_acknowledges_without_blocking() {
        let (state, path) = test_state("update").await;
        let app = build_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/update")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["data"]["status"].as_str(), Some("started"));

        tokio::fs::remove_dir_all(path.parent().unwrap()).await.ok();
    }

    #[tokio::test]
    async fn measures_endpoint_parses_json_list_columns() {
        let (state, _path) = test_state("measures").await;
        let row = tariffboard_db::TariffMeasureRow {
            id: "news_0011223344556677".to_string(),
            source_type: "news".to_string(),
            source_url: "https://example.com/a".to_string(),
            title: "Tariff update".to_string(),
            publication_date: "2025-03-01T00:00:00Z".to_string(),
            implementation_date: None,
            expiration_date: None,
            tariff_type: "Import Tariff".to_string(),
            affected_countries: "[\"China\"]".to_string(),
            affected_industries: "[\"Steel\"]".to_string(),
            tariff_rates: "{\"rates\": [25.0]}".to_string(),
            full_text: "Tariff update. Steel duties rise.".to_string(),
            extracted_highlights: "[\"Steel duties rise.\"]".to_string(),
            status: "active".to_string(),
            last_updated: "2025-03-01T00:00:00Z".to_string(),
        };
        tariffboard_db::upsert_measure(&state.pool, &row)
            .await
            .expect("seed measure");

        let app = build_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/measures")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["affected_countries"][0].as_str(), Some("China"));
        assert_eq!(data[0]["tariff_rates"]["rates"][0].as_f64(), Some(25.0));
    }
}
