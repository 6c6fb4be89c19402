//! Read side of the API: snapshot slices served from the published artifact.
//!
//! The snapshot file is re-read at most once per TTL window; a cycle trigger
//! invalidates the cache so fresh data shows up immediately after a rebuild.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, Extension, Json};
use tokio::sync::Mutex;

use tariffboard_pipeline::snapshot::{self, DashboardSnapshot};

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

struct CachedSnapshot {
    loaded_at: Instant,
    snapshot: Arc<DashboardSnapshot>,
}

/// TTL cache over the on-disk dashboard snapshot.
#[derive(Clone)]
pub struct SnapshotCache {
    path: Arc<PathBuf>,
    ttl: Duration,
    inner: Arc<Mutex<Option<CachedSnapshot>>>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self {
            path: Arc::new(path),
            ttl,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Drops the cached copy so the next read hits the file.
    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }

    /// Returns the current snapshot, reloading from disk when the cached
    /// copy has expired. `Ok(None)` means no snapshot has been published.
    ///
    /// # Errors
    ///
    /// Returns the underlying read/decode error when the file exists but
    /// cannot be loaded.
    pub async fn load(
        &self,
    ) -> Result<Option<Arc<DashboardSnapshot>>, tariffboard_pipeline::CycleError> {
        let mut inner = self.inner.lock().await;
        if let Some(cached) = inner.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(Some(Arc::clone(&cached.snapshot)));
            }
        }

        match snapshot::read_snapshot(&self.path).await? {
            Some(fresh) => {
                let fresh = Arc::new(fresh);
                *inner = Some(CachedSnapshot {
                    loaded_at: Instant::now(),
                    snapshot: Arc::clone(&fresh),
                });
                Ok(Some(fresh))
            }
            None => {
                *inner = None;
                Ok(None)
            }
        }
    }
}

async fn load_or_404(state: &AppState, request_id: &str) -> Result<Arc<DashboardSnapshot>, ApiError> {
    match state.snapshots.load().await {
        Ok(Some(snapshot)) => Ok(snapshot),
        Ok(None) => Err(ApiError::new(
            request_id,
            "not_found",
            "dashboard snapshot not generated yet",
        )),
        Err(e) => {
            tracing::error!(error = %e, "failed to load dashboard snapshot");
            Err(ApiError::new(
                request_id,
                "internal_error",
                "failed to load dashboard snapshot",
            ))
        }
    }
}

pub(super) async fn get_dashboard(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Arc<DashboardSnapshot>>>, ApiError> {
    let snapshot = load_or_404(&state, &req_id.0).await?;
    Ok(Json(ApiResponse {
        data: snapshot,
        meta: ResponseMeta::new(req_id.0),
    }))
}

macro_rules! slice_handler {
    ($name:ident, $field:ident, $ty:ty) => {
        pub(super) async fn $name(
            State(state): State<AppState>,
            Extension(req_id): Extension<RequestId>,
        ) -> Result<Json<ApiResponse<$ty>>, ApiError> {
            let snapshot = load_or_404(&state, &req_id.0).await?;
            Ok(Json(ApiResponse {
                data: snapshot.$field.clone(),
                meta: ResponseMeta::new(req_id.0),
            }))
        }
    };
}

slice_handler!(
    get_heatmap,
    heatmap_data,
    Vec<tariffboard_pipeline::snapshot::HeatmapEntry>
);
slice_handler!(
    get_sectors,
    sector_data,
    Vec<tariffboard_pipeline::snapshot::SectorSlice>
);
slice_handler!(
    get_time_series,
    time_series,
    Vec<tariffboard_pipeline::snapshot::TimeSeriesPoint>
);
slice_handler!(
    get_detail_table,
    detail_table,
    tariffboard_pipeline::snapshot::DetailTable
);

pub(super) async fn get_countries(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<tariffboard_pipeline::snapshot::CountryDetail>>>, ApiError> {
    let snapshot = load_or_404(&state, &req_id.0).await?;
    Ok(Json(ApiResponse {
        data: snapshot.detail_table.countries.clone(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_industries(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<tariffboard_pipeline::snapshot::IndustryDetail>>>, ApiError> {
    let snapshot = load_or_404(&state, &req_id.0).await?;
    Ok(Json(ApiResponse {
        data: snapshot.detail_table.industries.clone(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
