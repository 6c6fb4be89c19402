//! Client for the WTO Timeseries API.
//!
//! The `/data` endpoint has shipped two envelope shapes over time: rows under
//! a top-level `"Dataset"` array, and rows under `"data"`. Both are handled in
//! [`extract_dataset_rows`] so the rest of the pipeline never probes JSON
//! dynamically.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::retry::retry_with_backoff;
use crate::FetchPolicy;

const DEFAULT_BASE_URL: &str = "https://api.wto.org/timeseries/v1";
const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const MAX_RECORDS: u32 = 500;

/// A tariff indicator listed by the `/indicators` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WtoIndicator {
    pub code: String,
    pub name: String,
}

/// One data row from the `/data` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WtoTariffRow {
    #[serde(rename = "ReportingEconomy")]
    pub reporting_economy: String,
    #[serde(rename = "Value")]
    pub value: Option<f64>,
}

pub struct WtoClient {
    client: Client,
    api_key: String,
    base_url: Url,
    policy: FetchPolicy,
}

impl WtoClient {
    /// Creates a client pointed at the production WTO API.
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
            .map_err(|e| SourceError::shape("wto", format!("invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            policy,
        })
    }

    /// Lists indicators whose name matches `name` (e.g. `"tariff"`).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on network failure, a non-2xx status, or a
    /// response that does not deserialize as an indicator list.
    pub async fn fetch_indicators(&self, name: &str) -> Result<Vec<WtoIndicator>, SourceError> {
        let url = self.build_url("indicators", &[("name", name)])?;
        let body = retry_with_backoff(self.policy.max_retries, self.policy.backoff_base_ms, || {
            self.request_json(url.clone())
        })
        .await?;

        let Some(body) = body else {
            return Ok(Vec::new());
        };

        serde_json::from_value(body).map_err(|e| SourceError::Deserialize {
            context: format!("indicators(name={name})"),
            source: e,
        })
    }

    /// Fetches up to [`MAX_RECORDS`] tariff rows for one indicator across all
    /// reporting economies.
    ///
    /// HTTP 204 (no data for the requested parameters) yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on network failure, a non-2xx status, or an
    /// unrecognized envelope shape.
    pub async fn fetch_tariff_data(
        &self,
        indicator_code: &str,
    ) -> Result<Vec<WtoTariffRow>, SourceError> {
        let max = MAX_RECORDS.to_string();
        let url = self.build_url(
            "data",
            &[
                ("i", indicator_code),
                ("r", "all"),
                ("ps", "default"),
                ("fmt", "json"),
                ("max", &max),
            ],
        )?;
        let body = retry_with_backoff(self.policy.max_retries, self.policy.backoff_base_ms, || {
            self.request_json(url.clone())
        })
        .await?;

        let Some(body) = body else {
            return Ok(Vec::new());
        };

        extract_dataset_rows(&body)
    }

    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| SourceError::shape("wto", format!("invalid path {path}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends a GET, mapping 204 to `None`, 429 to [`SourceError::RateLimited`],
    /// other non-2xx to [`SourceError::UnexpectedStatus`], and the body to JSON.
    async fn request_json(&self, url: Url) -> Result<Option<serde_json::Value>, SourceError> {
        let response = self
            .client
            .get(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited {
                    source_name: "wto",
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
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| SourceError::Deserialize {
                context: url.to_string(),
                source: e,
            })
    }
}

pub(crate) fn retry_after_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60)
}

/// Pulls the row array out of either observed `/data` envelope shape.
fn extract_dataset_rows(body: &serde_json::Value) -> Result<Vec<WtoTariffRow>, SourceError> {
    let rows = body
        .get("Dataset")
        .or_else(|| body.get("data"))
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| SourceError::shape("wto", "response has neither Dataset nor data array"))?;

    // Individual rows that fail to deserialize are skipped, not fatal.
    Ok(rows
        .iter()
        .filter_map(|row| serde_json::from_value::<WtoTariffRow>(row.clone()).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_rows_from_dataset_envelope() {
        let body = serde_json::json!({
            "Dataset": [
                { "ReportingEconomy": "China", "Value": 5.0 },
                { "ReportingEconomy": "China", "Value": 9.0 }
            ]
        });
        let rows = extract_dataset_rows(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].reporting_economy, "China");
        assert_eq!(rows[1].value, Some(9.0));
    }

    #[test]
    fn extract_rows_from_lowercase_data_envelope() {
        let body = serde_json::json!({
            "data": [{ "ReportingEconomy": "Japan", "Value": 2.5 }]
        });
        let rows = extract_dataset_rows(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reporting_economy, "Japan");
    }

    #[test]
    fn extract_rows_rejects_unknown_envelope() {
        let body = serde_json::json!({ "rows": [] });
        assert!(extract_dataset_rows(&body).is_err());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let body = serde_json::json!({
            "Dataset": [
                { "ReportingEconomy": "China", "Value": 5.0 },
                { "Value": 1.0 },
                { "ReportingEconomy": "India" }
            ]
        });
        let rows = extract_dataset_rows(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].reporting_economy, "India");
        assert_eq!(rows[1].value, None);
    }
}
