use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;

use tariffboard_pipeline::CycleError;

use super::{ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub(super) struct CycleAck {
    status: &'static str,
}

/// `POST /api/update`: fire-and-forget full collection cycle.
pub(super) async fn trigger_update(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> (StatusCode, Json<ApiResponse<CycleAck>>) {
    trigger_cycle(state, req_id)
}

/// `POST /api/refresh`: same as update, but also drops the snapshot cache
/// immediately so readers stop seeing the stale copy while the cycle runs.
pub(super) async fn trigger_refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> (StatusCode, Json<ApiResponse<CycleAck>>) {
    state.snapshots.invalidate().await;
    trigger_cycle(state, req_id)
}

fn trigger_cycle(
    state: AppState,
    req_id: RequestId,
) -> (StatusCode, Json<ApiResponse<CycleAck>>) {
    let meta = ResponseMeta::new(req_id.0);

    if state.orchestrator.is_running() {
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse {
                data: CycleAck {
                    status: "already_running",
                },
                meta,
            }),
        );
    }

    let orchestrator = Arc::clone(&state.orchestrator);
    let snapshots = state.snapshots.clone();
    tokio::spawn(async move {
        match orchestrator.run_full_cycle().await {
            Ok(report) => {
                snapshots.invalidate().await;
                tracing::info!(
                    sources_ok = report.succeeded_sources().len(),
                    measures = report.measures_written,
                    "triggered cycle finished"
                );
            }
            // Lost the race to a concurrent trigger; nothing to do.
            Err(CycleError::AlreadyRunning) => {
                tracing::info!("triggered cycle skipped, another cycle was already running");
            }
            Err(e) => {
                tracing::error!(error = %e, "triggered cycle failed");
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: CycleAck { status: "started" },
            meta,
        }),
    )
}
