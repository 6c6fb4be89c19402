//! Cycle orchestration: run collectors in sequence, persist, derive, snapshot.
//!
//! Collectors sit behind a trait so the cycle logic can be exercised with
//! canned batches in tests. Failure isolation lives here: one source failing
//! is recorded and skipped, while store errors abort the cycle (the previous
//! snapshot keeps serving).

use std::path::PathBuf;

use chrono::{DateTime, Datelike, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use tariffboard_core::AppConfig;
use tariffboard_sources::{
    BeaClient, BeaGdpRow, BeaItaRow, CensusClient, CensusDashboard, FetchPolicy, NewsClient,
    RawAnnouncement, RawArticle, SourceError, WhiteHouseClient, WtoClient, WtoTariffRow,
};

use crate::classify::Classifier;
use crate::{metrics, normalize, snapshot, CycleError};

/// Everything one collector hands back in a cycle.
pub enum RawBatch {
    WhiteHouse(Vec<RawAnnouncement>),
    News(Vec<RawArticle>),
    Census(CensusDashboard),
    Bea {
        gdp: Vec<BeaGdpRow>,
        trade: Vec<BeaItaRow>,
    },
    Wto(Vec<WtoTariffRow>),
}

/// A data source the orchestrator can run.
pub trait Collector: Send + Sync {
    /// Display name, also used in snapshot metadata ("WTO", "News API", ...).
    fn name(&self) -> &'static str;

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>>;
}

/// Outcome of one source within a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub ok: bool,
    pub records_written: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one collection cycle, retained for `/api/health`.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: String,
    pub finished_at: String,
    pub source_status: Vec<SourceStatus>,
    pub measures_written: usize,
    pub snapshot_written: bool,
}

impl CycleReport {
    /// Names of the sources that contributed data this cycle.
    #[must_use]
    pub fn succeeded_sources(&self) -> Vec<String> {
        self.source_status
            .iter()
            .filter(|s| s.ok)
            .map(|s| s.name.clone())
            .collect()
    }
}

pub struct Orchestrator {
    pool: SqlitePool,
    collectors: Vec<Box<dyn Collector>>,
    snapshot_path: PathBuf,
    classifier: Classifier,
    cycle_guard: Mutex<()>,
    last_report: RwLock<Option<CycleReport>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(pool: SqlitePool, collectors: Vec<Box<dyn Collector>>, snapshot_path: PathBuf) -> Self {
        Self {
            pool,
            collectors,
            snapshot_path,
            classifier: Classifier::new(),
            cycle_guard: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    /// Runs a full cycle: every collector, then the metrics sweep, then the
    /// snapshot. At most one cycle runs at a time; a trigger while one is in
    /// flight returns [`CycleError::AlreadyRunning`] instead of queueing.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] when the cycle is skipped or a store/snapshot
    /// step fails. Individual source failures do not error; they appear in
    /// the report.
    pub async fn run_full_cycle(&self) -> Result<CycleReport, CycleError> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            return Err(CycleError::AlreadyRunning);
        };

        let started_at = Utc::now().to_rfc3339();
        tracing::info!(started_at, "collection cycle starting");

        let mut statuses = Vec::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            statuses.push(self.run_collector(collector.as_ref()).await?);
        }

        let now = Utc::now().to_rfc3339();
        metrics::run_metrics_sweep(&self.pool, &now).await?;

        let succeeded: Vec<String> = statuses
            .iter()
            .filter(|s| s.ok)
            .map(|s| s.name.clone())
            .collect();
        let dashboard = snapshot::build_snapshot(&self.pool, succeeded, &now).await?;
        snapshot::write_snapshot(&dashboard, &self.snapshot_path).await?;

        let report = self
            .finish_report(started_at, statuses, true)
            .await;
        Ok(report)
    }

    /// Runs only the named collectors, persisting their batches without the
    /// metrics sweep or snapshot rebuild. Used by the intraday sub-cycles.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::AlreadyRunning`] when a cycle holds the guard,
    /// or [`CycleError::Db`] on a store failure.
    pub async fn run_sources(&self, names: &[&str]) -> Result<CycleReport, CycleError> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            return Err(CycleError::AlreadyRunning);
        };

        let started_at = Utc::now().to_rfc3339();
        let mut statuses = Vec::new();
        for collector in &self.collectors {
            if !names.contains(&collector.name()) {
                continue;
            }
            statuses.push(self.run_collector(collector.as_ref()).await?);
        }

        let report = self.finish_report(started_at, statuses, false).await;
        Ok(report)
    }

    /// The most recent cycle report, if any cycle has run.
    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Whether a cycle currently holds the guard. Best-effort: the answer
    /// can be stale by the time the caller acts on it.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.cycle_guard.try_lock().is_err()
    }

    async fn run_collector(&self, collector: &dyn Collector) -> Result<SourceStatus, CycleError> {
        let name = collector.name();
        match collector.collect().await {
            Ok(batch) => {
                let written = self.persist_batch(batch).await?;
                tracing::info!(source = name, records = written, "source collected");
                Ok(SourceStatus {
                    name: name.to_string(),
                    ok: true,
                    records_written: written,
                    error: None,
                })
            }
            Err(e) => {
                tracing::warn!(source = name, error = %e, "source failed, continuing cycle");
                Ok(SourceStatus {
                    name: name.to_string(),
                    ok: false,
                    records_written: 0,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    async fn persist_batch(&self, batch: RawBatch) -> Result<usize, CycleError> {
        let now = Utc::now().to_rfc3339();
        let mut written = 0usize;

        match batch {
            RawBatch::WhiteHouse(announcements) => {
                for announcement in &announcements {
                    let Some(row) =
                        normalize::announcement_measure(announcement, &self.classifier, &now)
                    else {
                        continue;
                    };
                    tariffboard_db::upsert_measure(&self.pool, &row).await?;
                    written += 1;
                }
            }
            RawBatch::News(articles) => {
                for article in &articles {
                    let row = normalize::article_measure(article, &self.classifier, &now);
                    tariffboard_db::upsert_measure(&self.pool, &row).await?;
                    written += 1;
                }
            }
            RawBatch::Census(dashboard) => {
                for district in &dashboard.trade_balance {
                    let row = normalize::district_profile(district, &now);
                    tariffboard_db::upsert_country_profile(&self.pool, &row).await?;
                    written += 1;
                }
                for chapter in &dashboard.hs_data {
                    let row = normalize::hs_industry_profile(chapter, &now);
                    tariffboard_db::upsert_industry_profile(&self.pool, &row).await?;
                    written += 1;
                }
                for series in normalize::annual_series_rows(&dashboard.time_series, &now) {
                    tariffboard_db::upsert_series(&self.pool, &series).await?;
                    written += 1;
                }
            }
            RawBatch::Bea { gdp, trade } => {
                for row in &gdp {
                    let code = format!("BEA_{}", row.industry_code);
                    let name = row.description.as_deref().unwrap_or(&row.industry_code);
                    tariffboard_db::set_industry_gdp_value(
                        &self.pool,
                        &code,
                        name,
                        row.gdp_value,
                        &now,
                    )
                    .await?;
                    written += 1;
                }
                for row in &trade {
                    let code = format!("BEA_{}", row.country);
                    let trend = serde_json::json!([row.balance]).to_string();
                    tariffboard_db::set_country_trade_deficit(
                        &self.pool,
                        &code,
                        &row.country,
                        row.balance,
                        &trend,
                        &now,
                    )
                    .await?;
                    written += 1;
                }
            }
            RawBatch::Wto(rows) => {
                for (economy, mean_rate) in normalize::wto_mean_tariffs(&rows) {
                    let code = format!("WTO_{economy}");
                    tariffboard_db::set_country_initial_tariff(
                        &self.pool,
                        &code,
                        &economy,
                        mean_rate,
                        &now,
                    )
                    .await?;
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    async fn finish_report(
        &self,
        started_at: String,
        statuses: Vec<SourceStatus>,
        snapshot_written: bool,
    ) -> CycleReport {
        let measures_written = statuses
            .iter()
            .filter(|s| s.name == "White House" || s.name == "News API")
            .map(|s| s.records_written)
            .sum();
        let report = CycleReport {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            source_status: statuses,
            measures_written,
            snapshot_written,
        };
        tracing::info!(
            sources_ok = report.source_status.iter().filter(|s| s.ok).count(),
            sources_total = report.source_status.len(),
            measures = report.measures_written,
            "collection cycle finished"
        );
        *self.last_report.write().await = Some(report.clone());
        report
    }
}

/// Census reference period: the most recent month with complete data.
///
/// Monthly trade releases lag by several weeks, and the historical endpoints
/// currently end at 2024-12, so any date in 2025 or later pins to that
/// period; earlier dates use the previous month, rolling back to December of
/// the prior year in January.
#[must_use]
pub fn census_period(now: DateTime<Utc>) -> (String, String) {
    if now.year() >= 2025 {
        ("2024".to_string(), "12".to_string())
    } else if now.month() == 1 {
        ((now.year() - 1).to_string(), "12".to_string())
    } else {
        (now.year().to_string(), format!("{:02}", now.month() - 1))
    }
}

struct WhiteHouseCollector {
    client: WhiteHouseClient,
}

impl Collector for WhiteHouseCollector {
    fn name(&self) -> &'static str {
        "White House"
    }

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>> {
        Box::pin(async {
            let posts = self.client.fetch_presidential_actions().await?;
            Ok(RawBatch::WhiteHouse(posts))
        })
    }
}

struct NewsCollector {
    client: NewsClient,
}

impl Collector for NewsCollector {
    fn name(&self) -> &'static str {
        "News API"
    }

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>> {
        Box::pin(async {
            let articles = self.client.fetch_tariff_articles().await?;
            Ok(RawBatch::News(articles))
        })
    }
}

struct CensusCollector {
    client: CensusClient,
}

impl Collector for CensusCollector {
    fn name(&self) -> &'static str {
        "Census"
    }

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>> {
        Box::pin(async {
            let (year, month) = census_period(Utc::now());
            let dashboard = self.client.fetch_dashboard(&year, &month).await?;
            Ok(RawBatch::Census(dashboard))
        })
    }
}

struct BeaCollector {
    client: BeaClient,
}

impl Collector for BeaCollector {
    fn name(&self) -> &'static str {
        "BEA"
    }

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>> {
        Box::pin(async {
            let gdp = self.client.fetch_gdp_by_industry().await?;
            let trade = self.client.fetch_trade_balances().await?;
            Ok(RawBatch::Bea { gdp, trade })
        })
    }
}

struct WtoCollector {
    client: WtoClient,
}

impl Collector for WtoCollector {
    fn name(&self) -> &'static str {
        "WTO"
    }

    fn collect(&self) -> BoxFuture<'_, Result<RawBatch, SourceError>> {
        Box::pin(async {
            let indicators = self.client.fetch_indicators("tariff").await?;
            let Some(indicator) = indicators.first() else {
                return Err(SourceError::shape("wto", "no tariff indicators available"));
            };
            tracing::info!(indicator = indicator.code, "using WTO tariff indicator");
            let rows = self.client.fetch_tariff_data(&indicator.code).await?;
            Ok(RawBatch::Wto(rows))
        })
    }
}

/// Builds the production collector set from configuration.
///
/// Sources whose API key is not configured are left out (logged as skipped);
/// the White House feed needs no key and is always present.
///
/// # Errors
///
/// Returns [`SourceError`] if an HTTP client fails to construct.
pub fn clients_from_config(config: &AppConfig) -> Result<Vec<Box<dyn Collector>>, SourceError> {
    let policy = FetchPolicy {
        request_timeout_secs: config.source_request_timeout_secs,
        max_retries: config.source_max_retries,
        backoff_base_ms: config.source_backoff_base_ms,
    };

    let mut collectors: Vec<Box<dyn Collector>> = vec![Box::new(WhiteHouseCollector {
        client: WhiteHouseClient::new(policy)?,
    })];

    match &config.news_api_key {
        Some(key) => collectors.push(Box::new(NewsCollector {
            client: NewsClient::new(key, policy)?,
        })),
        None => tracing::warn!("NEWSAPI_KEY not set, news source disabled"),
    }
    match &config.census_api_key {
        Some(key) => collectors.push(Box::new(CensusCollector {
            client: CensusClient::new(key, policy)?,
        })),
        None => tracing::warn!("CENSUS_API_KEY not set, census source disabled"),
    }
    match &config.bea_api_key {
        Some(key) => collectors.push(Box::new(BeaCollector {
            client: BeaClient::new(key, policy)?,
        })),
        None => tracing::warn!("BEA_API_KEY not set, BEA source disabled"),
    }
    match &config.wto_api_key {
        Some(key) => collectors.push(Box::new(WtoCollector {
            client: WtoClient::new(key, policy)?,
        })),
        None => tracing::warn!("WTO_API_KEY not set, WTO source disabled"),
    }

    Ok(collectors)
}
