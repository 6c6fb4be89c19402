//! Collection cycle: classify, normalize, persist, derive metrics, snapshot.
//!
//! The orchestrator runs the five source collectors in sequence, feeds their
//! raw batches through the per-source normalizers into the store, sweeps the
//! derived metrics, and writes the dashboard snapshot. A failing source is
//! skipped, never fatal; the snapshot's metadata records which sources
//! actually contributed.

pub mod classify;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod snapshot;

pub use classify::{Classification, Classifier};
pub use orchestrator::{
    clients_from_config, Collector, CycleReport, Orchestrator, RawBatch, SourceStatus,
};
pub use snapshot::{DashboardSnapshot, SnapshotMetadata};

use tariffboard_db::DbError;
use tariffboard_sources::SourceError;

/// Failure of a whole collection cycle, as opposed to a single source.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("another collection cycle is already in progress")]
    AlreadyRunning,

    #[error("database error during cycle: {0}")]
    Db(#[from] DbError),

    #[error("source error outside collector isolation: {0}")]
    Source(#[from] SourceError),

    #[error("failed to write dashboard snapshot to {path}: {source}")]
    SnapshotWrite {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to encode dashboard snapshot: {0}")]
    SnapshotEncode(#[from] serde_json::Error),
}
