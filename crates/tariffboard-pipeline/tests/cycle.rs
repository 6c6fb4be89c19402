//! End-to-end cycle tests with canned collectors standing in for the HTTP
//! clients.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::Notify;

use tariffboard_db::reset_schema;
use tariffboard_pipeline::{
    snapshot, Collector, CycleError, Orchestrator, RawBatch, SourceStatus,
};
use tariffboard_sources::{
    AnnualTradePoint, CensusDashboard, DistrictTrade, HsChapterValue, RawArticle, SourceError,
    WtoTariffRow,
};

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should connect");
    reset_schema(&pool).await.expect("schema reset");
    pool
}

fn snapshot_path(tag: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("tariffboard-cycle-{}-{tag}", std::process::id()))
        .join("dashboard_data.json")
}

/// A collector that returns a pre-built batch, or fails.
struct CannedCollector {
    name: &'static str,
    result: std::sync::Mutex<Option<Result<RawBatch, SourceError>>>,
}

impl CannedCollector {
    fn ok(name: &'static str, batch: RawBatch) -> Box<dyn Collector> {
        Box::new(Self {
            name,
            result: std::sync::Mutex::new(Some(Ok(batch))),
        })
    }

    fn failing(name: &'static str) -> Box<dyn Collector> {
        Box::new(Self {
            name,
            result: std::sync::Mutex::new(Some(Err(SourceError::UnexpectedStatus {
                status: 503,
                url: "http://upstream".to_string(),
            }))),
        })
    }
}

impl Collector for CannedCollector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>> {
        let result = self
            .result
            .lock()
            .expect("result mutex")
            .take()
            .expect("collector used once per test");
        Box::pin(async move { result })
    }
}

fn news_batch() -> RawBatch {
    let article: RawArticle = serde_json::from_value(serde_json::json!({
        "title": "US imposes 25% tariff on Chinese steel",
        "description": "New duties on steel imports from China were announced.",
        "content": "The tariff takes effect April 2nd, 2025.",
        "url": "https://example.com/steel",
        "publishedAt": "2025-03-01T12:00:00Z",
        "source": {"name": "Example Wire"}
    }))
    .expect("fixture article");
    RawBatch::News(vec![article])
}

fn census_batch() -> RawBatch {
    RawBatch::Census(CensusDashboard {
        trade_balance: vec![DistrictTrade {
            district: "10".to_string(),
            district_name: "Boston, MA".to_string(),
            exports_value: 50.0,
            imports_value: 150.0,
            trade_balance: -100.0,
        }],
        hs_data: vec![HsChapterValue {
            hs_chapter: "72".to_string(),
            description: Some("IRON AND STEEL".to_string()),
            value: 5_000_000.0,
        }],
        time_series: vec![AnnualTradePoint {
            year: "2024".to_string(),
            exports_billions: 2100.0,
            imports_billions: 3100.0,
            deficit_billions: 1000.0,
        }],
    })
}

fn wto_batch() -> RawBatch {
    RawBatch::Wto(vec![
        WtoTariffRow {
            reporting_economy: "China".to_string(),
            value: Some(5.0),
        },
        WtoTariffRow {
            reporting_economy: "China".to_string(),
            value: Some(9.0),
        },
    ])
}

#[tokio::test]
async fn full_cycle_persists_derives_and_snapshots() {
    let pool = test_pool().await;
    let path = snapshot_path("full");
    let orchestrator = Orchestrator::new(
        pool.clone(),
        vec![
            CannedCollector::ok("News API", news_batch()),
            CannedCollector::ok("Census", census_batch()),
            CannedCollector::ok("WTO", wto_batch()),
        ],
        path.clone(),
    );

    let report = orchestrator.run_full_cycle().await.expect("cycle runs");
    assert!(report.source_status.iter().all(|s| s.ok));
    assert_eq!(report.measures_written, 1);
    assert!(report.snapshot_written);

    // Measure landed with classification applied.
    let measures = tariffboard_db::list_recent_measures(&pool, 50).await.unwrap();
    assert_eq!(measures.len(), 1);
    assert_eq!(measures[0].status, "active");
    assert!(measures[0].affected_countries.contains("China"));

    // WTO means merged into a country row, Census district present too.
    let countries = tariffboard_db::list_country_profiles(&pool).await.unwrap();
    let wto_china = countries
        .iter()
        .find(|c| c.country_code == "WTO_China")
        .expect("WTO country row");
    assert_eq!(wto_china.initial_tariff, 7.0);
    // Metrics sweep ran: tariff impact derived from the merged rate.
    assert_eq!(wto_china.tariff_impact, 7.0 * 0.05);

    let boston = countries
        .iter()
        .find(|c| c.country_code == "CTY_10")
        .expect("census district row");
    assert!(boston.supply_chain_risk > 0.0);
    assert!(boston.supply_chain_risk <= 100.0);

    // Snapshot on disk matches what a reader would serve.
    let written = snapshot::read_snapshot(&path)
        .await
        .unwrap()
        .expect("snapshot written");
    assert_eq!(
        written.metadata.data_sources,
        ["News API", "Census", "WTO"].map(String::from)
    );
    assert!(written.sector_data.iter().any(|s| s.sector == "Steel"));
    assert_eq!(written.time_series.len(), 1);

    tokio::fs::remove_dir_all(path.parent().unwrap()).await.ok();
}

#[tokio::test]
async fn failing_source_is_isolated_and_left_out_of_metadata() {
    let pool = test_pool().await;
    let path = snapshot_path("partial");
    let orchestrator = Orchestrator::new(
        pool.clone(),
        vec![
            CannedCollector::failing("News API"),
            CannedCollector::ok("Census", census_batch()),
        ],
        path.clone(),
    );

    let report = orchestrator.run_full_cycle().await.expect("cycle survives");
    let news: &SourceStatus = &report.source_status[0];
    assert!(!news.ok);
    assert!(news.error.as_deref().unwrap_or_default().contains("503"));
    assert!(report.source_status[1].ok);

    let written = snapshot::read_snapshot(&path)
        .await
        .unwrap()
        .expect("snapshot still written");
    assert_eq!(written.metadata.data_sources, vec!["Census".to_string()]);
    assert_eq!(written.heatmap_data.len(), 1);

    tokio::fs::remove_dir_all(path.parent().unwrap()).await.ok();
}

#[tokio::test]
async fn sub_cycle_persists_without_snapshot() {
    let pool = test_pool().await;
    let path = snapshot_path("sub");
    let orchestrator = Orchestrator::new(
        pool.clone(),
        vec![
            CannedCollector::ok("News API", news_batch()),
            CannedCollector::ok("WTO", wto_batch()),
        ],
        path.clone(),
    );

    let report = orchestrator
        .run_sources(&["News API"])
        .await
        .expect("sub-cycle runs");
    assert_eq!(report.source_status.len(), 1);
    assert!(!report.snapshot_written);

    assert_eq!(tariffboard_db::count_measures(&pool).await.unwrap(), 1);
    // WTO was not in the subset, so no country rows exist.
    assert!(tariffboard_db::list_country_profiles(&pool)
        .await
        .unwrap()
        .is_empty());
    assert!(snapshot::read_snapshot(&path).await.unwrap().is_none());
}

/// A collector that blocks until released, to hold the cycle guard open.
struct BlockingCollector {
    release: Arc<Notify>,
}

impl Collector for BlockingCollector {
    fn name(&self) -> &'static str {
        "News API"
    }

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>> {
        let release = Arc::clone(&self.release);
        Box::pin(async move {
            release.notified().await;
            Ok(RawBatch::News(Vec::new()))
        })
    }
}

#[tokio::test]
async fn concurrent_trigger_is_rejected_not_queued() {
    let pool = test_pool().await;
    let release = Arc::new(Notify::new());
    let orchestrator = Arc::new(Orchestrator::new(
        pool,
        vec![Box::new(BlockingCollector {
            release: Arc::clone(&release),
        })],
        snapshot_path("guard"),
    ));

    let running = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run_full_cycle().await })
    };
    // Let the first cycle reach the blocking collector.
    tokio::task::yield_now().await;

    let second = orchestrator.run_full_cycle().await;
    assert!(matches!(second, Err(CycleError::AlreadyRunning)));

    release.notify_one();
    let first = running.await.expect("task joins");
    assert!(first.is_ok(), "first cycle completes after release");

    let dir = snapshot_path("guard");
    tokio::fs::remove_dir_all(dir.parent().unwrap()).await.ok();
}
