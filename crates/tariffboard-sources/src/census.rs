//! Client for the U.S. Census Bureau international trade API.
//!
//! Census endpoints return a JSON table: an array of arrays whose first row
//! is the header. [`parse_table`] converts that into keyed records once, so
//! downstream code works with named fields.
//!
//! Trade values here are reported by customs *district*, not by trading
//! partner; the pipeline knowingly treats districts as country-level rows.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use crate::error::SourceError;
use crate::retry::retry_with_backoff;
use crate::wto::retry_after_secs;
use crate::FetchPolicy;

const DEFAULT_BASE_URL: &str = "https://api.census.gov";
const ANNUAL_SERIES_YEARS: i32 = 5;

/// Per-district monthly trade values.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictTrade {
    pub district: String,
    pub district_name: String,
    pub exports_value: f64,
    pub imports_value: f64,
    pub trade_balance: f64,
}

/// Monthly export value summed per 2-digit HS chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct HsChapterValue {
    pub hs_chapter: String,
    pub description: Option<String>,
    pub value: f64,
}

/// One year of national totals, in billions of dollars.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualTradePoint {
    pub year: String,
    pub exports_billions: f64,
    pub imports_billions: f64,
    pub deficit_billions: f64,
}

/// Everything the pipeline consumes from one Census collection.
#[derive(Debug, Clone, Default)]
pub struct CensusDashboard {
    pub trade_balance: Vec<DistrictTrade>,
    pub hs_data: Vec<HsChapterValue>,
    pub time_series: Vec<AnnualTradePoint>,
}

pub struct CensusClient {
    client: Client,
    api_key: String,
    base_url: Url,
    policy: FetchPolicy,
}

impl CensusClient {
    /// Creates a client pointed at the production Census API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, policy: FetchPolicy) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, policy, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed, or
    /// [`SourceError::Shape`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        api_key: &str,
        policy: FetchPolicy,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(policy.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tariffboard/0.1 (trade-data-aggregation)")
            .build()?;

        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| SourceError::shape("census", format!("invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            policy,
        })
    }

    /// Collects the three Census fragments for the given reference month.
    ///
    /// District trade and HS chapter values come from the monthly endpoints;
    /// the annual series covers the [`ANNUAL_SERIES_YEARS`] years ending at
    /// `year`. Any individual fragment failure is logged and degrades to an
    /// empty list so the others still flow.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] only if *all* fragments fail.
    pub async fn fetch_dashboard(
        &self,
        year: &str,
        month: &str,
    ) -> Result<CensusDashboard, SourceError> {
        let period = format!("{year}-{month}");

        let mut dashboard = CensusDashboard::default();
        let mut last_err = None;

        match self.fetch_district_trade(&period).await {
            Ok(rows) => dashboard.trade_balance = rows,
            Err(e) => {
                tracing::warn!(error = %e, period, "census district trade fetch failed");
                last_err = Some(e);
            }
        }

        match self.fetch_hs_chapters(&period).await {
            Ok(rows) => dashboard.hs_data = rows,
            Err(e) => {
                tracing::warn!(error = %e, period, "census HS chapter fetch failed");
                last_err = Some(e);
            }
        }

        match self.fetch_annual_series(year).await {
            Ok(rows) => dashboard.time_series = rows,
            Err(e) => {
                tracing::warn!(error = %e, year, "census annual series fetch failed");
                last_err = Some(e);
            }
        }

        let all_empty = dashboard.trade_balance.is_empty()
            && dashboard.hs_data.is_empty()
            && dashboard.time_series.is_empty();
        match (all_empty, last_err) {
            (true, Some(err)) => Err(err),
            _ => Ok(dashboard),
        }
    }

    /// Joins the district-level export and import tables on district code.
    async fn fetch_district_trade(&self, period: &str) -> Result<Vec<DistrictTrade>, SourceError> {
        let exports = self
            .fetch_table(
                "data/timeseries/intltrade/exports/porths",
                &[("get", "DISTRICT,DIST_NAME,ALL_VAL_MO"), ("time", period)],
            )
            .await?;
        let imports = self
            .fetch_table(
                "data/timeseries/intltrade/imports/porths",
                &[("get", "DISTRICT,DIST_NAME,GEN_VAL_MO"), ("time", period)],
            )
            .await?;

        // BTreeMap keeps districts sorted so output order is stable.
        let mut merged: BTreeMap<String, DistrictTrade> = BTreeMap::new();
        for row in &exports {
            let Some(district) = row.get("DISTRICT").filter(|d| !d.is_empty()) else {
                continue;
            };
            let entry = merged
                .entry(district.clone())
                .or_insert_with(|| DistrictTrade {
                    district: district.clone(),
                    district_name: row
                        .get("DIST_NAME")
                        .cloned()
                        .unwrap_or_else(|| format!("District {district}")),
                    exports_value: 0.0,
                    imports_value: 0.0,
                    trade_balance: 0.0,
                });
            entry.exports_value += parse_f64(row.get("ALL_VAL_MO"));
        }
        for row in &imports {
            let Some(district) = row.get("DISTRICT").filter(|d| !d.is_empty()) else {
                continue;
            };
            let entry = merged
                .entry(district.clone())
                .or_insert_with(|| DistrictTrade {
                    district: district.clone(),
                    district_name: row
                        .get("DIST_NAME")
                        .cloned()
                        .unwrap_or_else(|| format!("District {district}")),
                    exports_value: 0.0,
                    imports_value: 0.0,
                    trade_balance: 0.0,
                });
            entry.imports_value += parse_f64(row.get("GEN_VAL_MO"));
        }

        Ok(merged
            .into_values()
            .map(|mut d| {
                d.trade_balance = d.exports_value - d.imports_value;
                d
            })
            .collect())
    }

    /// Sums monthly export values per 2-digit HS chapter.
    async fn fetch_hs_chapters(&self, period: &str) -> Result<Vec<HsChapterValue>, SourceError> {
        let rows = self
            .fetch_table(
                "data/timeseries/intltrade/exports/hs",
                &[
                    ("get", "E_COMMODITY,E_COMMODITY_SDESC,ALL_VAL_MO"),
                    ("COMM_LVL", "HS2"),
                    ("time", period),
                ],
            )
            .await?;

        let mut by_chapter: BTreeMap<String, HsChapterValue> = BTreeMap::new();
        for row in &rows {
            let Some(chapter) = row
                .get("E_COMMODITY")
                .map(|c| c.chars().take(2).collect::<String>())
                .filter(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_digit()))
            else {
                continue;
            };
            let entry = by_chapter
                .entry(chapter.clone())
                .or_insert_with(|| HsChapterValue {
                    hs_chapter: chapter,
                    description: row.get("E_COMMODITY_SDESC").cloned(),
                    value: 0.0,
                });
            entry.value += parse_f64(row.get("ALL_VAL_MO"));
        }
        Ok(by_chapter.into_values().collect())
    }

    /// Builds the national annual series from yearly endpoint totals.
    async fn fetch_annual_series(&self, year: &str) -> Result<Vec<AnnualTradePoint>, SourceError> {
        let end_year: i32 = year
            .parse()
            .map_err(|_| SourceError::shape("census", format!("bad year {year}")))?;

        let mut points = Vec::new();
        for y in (end_year - ANNUAL_SERIES_YEARS + 1)..=end_year {
            let y = y.to_string();
            let exports = self
                .fetch_table(
                    "data/timeseries/intltrade/exports/hs",
                    &[("get", "ALL_VAL_YR"), ("time", &y)],
                )
                .await?;
            let imports = self
                .fetch_table(
                    "data/timeseries/intltrade/imports/hs",
                    &[("get", "GEN_VAL_YR"), ("time", &y)],
                )
                .await?;

            let exports_total: f64 = exports.iter().map(|r| parse_f64(r.get("ALL_VAL_YR"))).sum();
            let imports_total: f64 = imports.iter().map(|r| parse_f64(r.get("GEN_VAL_YR"))).sum();
            if exports_total == 0.0 && imports_total == 0.0 {
                continue;
            }
            let exports_billions = exports_total / 1e9;
            let imports_billions = imports_total / 1e9;
            points.push(AnnualTradePoint {
                year: y,
                exports_billions,
                imports_billions,
                deficit_billions: imports_billions - exports_billions,
            });
        }
        Ok(points)
    }

    /// Fetches one endpoint and decodes the array-of-arrays table shape.
    async fn fetch_table(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<BTreeMap<String, String>>, SourceError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| SourceError::shape("census", format!("invalid path {path}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("key", &self.api_key);
        }

        let body = retry_with_backoff(self.policy.max_retries, self.policy.backoff_base_ms, || {
            self.request_json(url.clone())
        })
        .await?;
        parse_table(&body)
    }

    async fn request_json(&self, url: Url) -> Result<serde_json::Value, SourceError> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited {
                    source_name: "census",
                    retry_after_secs: retry_after_secs(&response),
                });
            }
            status if !status.is_success() => {
                return Err(SourceError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            _ => {}
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}

fn parse_f64(value: Option<&String>) -> f64 {
    value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}

/// Converts the Census table shape (header row + data rows) into keyed records.
///
/// Rows shorter than the header are padded with empty strings; extra cells
/// are dropped.
fn parse_table(body: &serde_json::Value) -> Result<Vec<BTreeMap<String, String>>, SourceError> {
    let rows = body
        .as_array()
        .ok_or_else(|| SourceError::shape("census", "response is not an array"))?;

    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header
        .as_array()
        .ok_or_else(|| SourceError::shape("census", "header row is not an array"))?
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();

    let mut records = Vec::with_capacity(data.len());
    for row in data {
        let Some(cells) = row.as_array() else {
            continue;
        };
        let mut record = BTreeMap::new();
        for (i, key) in header.iter().enumerate() {
            let value = cells
                .get(i)
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default();
            record.insert(key.clone(), value);
        }
        records.push(record);
    }
    Ok(records)
}
