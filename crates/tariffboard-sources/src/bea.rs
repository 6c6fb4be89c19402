//! Client for the Bureau of Economic Analysis (BEA) data API.
//!
//! Every BEA call goes to one endpoint with a `method` parameter. Responses
//! wrap payloads in `BEAAPI.Results`, which is sometimes an object and
//! sometimes a single-element array depending on the dataset; errors come
//! back as HTTP 200 with a `Results.Error` object. [`extract_data_rows`]
//! absorbs all three shapes.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{Datelike, Utc};
use reqwest::{Client, StatusCode, Url};

use crate::error::SourceError;
use crate::retry::retry_with_backoff;
use crate::wto::retry_after_secs;
use crate::FetchPolicy;

const DEFAULT_BASE_URL: &str = "https://apps.bea.gov/api/data";
const GDP_YEARS_BACK: i32 = 5;

/// Annual value added for one industry, latest reported year.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaGdpRow {
    pub industry_code: String,
    pub description: Option<String>,
    pub gdp_value: f64,
}

/// Balance on goods with one trading partner, latest reported year.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaItaRow {
    pub country: String,
    pub balance: f64,
}

pub struct BeaClient {
    client: Client,
    api_key: String,
    base_url: Url,
    policy: FetchPolicy,
}

impl BeaClient {
    /// Creates a client pointed at the production BEA API.
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

        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::shape("bea", format!("invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            policy,
        })
    }

    /// Fetches annual value added per industry (GDPbyIndustry table 1).
    ///
    /// When the response carries several years for an industry, the last row
    /// wins, which for BEA's chronological ordering is the latest year.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure or a malformed response.
    pub async fn fetch_gdp_by_industry(&self) -> Result<Vec<BeaGdpRow>, SourceError> {
        let years = recent_years(GDP_YEARS_BACK);
        let body = self
            .get_data(
                "GDPbyIndustry",
                &[
                    ("TableID", "1"),
                    ("Frequency", "A"),
                    ("Year", &years),
                    ("Industry", "ALL"),
                ],
            )
            .await?;
        let rows = extract_data_rows(&body)?;

        let mut by_industry: BTreeMap<String, BeaGdpRow> = BTreeMap::new();
        for row in rows {
            let Some(industry_code) = row
                .get("Industry")
                .and_then(|v| v.as_str())
                .filter(|c| !c.is_empty())
            else {
                continue;
            };
            let Some(value) = data_value(&row) else {
                tracing::debug!(industry = industry_code, "skipping non-numeric GDP value");
                continue;
            };
            // The API misspells this field as IndustrYDescription.
            let description = row
                .get("IndustrYDescription")
                .or_else(|| row.get("IndustryDescription"))
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned);
            by_industry.insert(
                industry_code.to_owned(),
                BeaGdpRow {
                    industry_code: industry_code.to_owned(),
                    description,
                    gdp_value: value,
                },
            );
        }
        Ok(by_industry.into_values().collect())
    }

    /// Fetches the annual balance on goods per trading partner (ITA BalGds).
    ///
    /// The `AllCountries` aggregate row is dropped; per-country rows keep the
    /// latest year's value.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure or a malformed response.
    pub async fn fetch_trade_balances(&self) -> Result<Vec<BeaItaRow>, SourceError> {
        let years = recent_years(GDP_YEARS_BACK);
        let body = self
            .get_data(
                "ITA",
                &[
                    ("Indicator", "BalGds"),
                    ("AreaOrCountry", "AllCountries"),
                    ("Frequency", "A"),
                    ("Year", &years),
                ],
            )
            .await?;
        let rows = extract_data_rows(&body)?;

        let mut by_country: BTreeMap<String, f64> = BTreeMap::new();
        for row in rows {
            let Some(country) = row
                .get("AreaOrCountry")
                .and_then(|v| v.as_str())
                .filter(|c| !c.is_empty() && *c != "AllCountries")
            else {
                continue;
            };
            let Some(balance) = data_value(&row) else {
                continue;
            };
            by_country.insert(country.to_owned(), balance);
        }
        Ok(by_country
            .into_iter()
            .map(|(country, balance)| BeaItaRow { country, balance })
            .collect())
    }

    async fn get_data(
        &self,
        dataset: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, SourceError> {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("method", "GETDATA");
            pairs.append_pair("DatasetName", dataset);
            pairs.append_pair("ResultFormat", "json");
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("UserID", &self.api_key);
        }

        retry_with_backoff(self.policy.max_retries, self.policy.backoff_base_ms, || {
            self.request_json(url.clone())
        })
        .await
    }

    async fn request_json(&self, url: Url) -> Result<serde_json::Value, SourceError> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited {
                    source_name: "bea",
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

/// Last `count` calendar years, newest last, comma-joined for the Year param.
fn recent_years(count: i32) -> String {
    let current = Utc::now().year();
    ((current - count + 1)..=current)
        .map(|y| y.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn data_value(row: &serde_json::Value) -> Option<f64> {
    match row.get("DataValue")? {
        serde_json::Value::Number(n) => n.as_f64(),
        // Values come back as strings with thousands separators.
        serde_json::Value::String(s) => s.replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Pulls `Data` rows out of the `BEAAPI.Results` envelope.
///
/// `Results` is an array for GDPbyIndustry and an object for ITA. An API
/// error looks like success at the HTTP layer, so `Results.Error` is checked
/// before anything else.
fn extract_data_rows(body: &serde_json::Value) -> Result<Vec<serde_json::Value>, SourceError> {
    let results = body
        .get("BEAAPI")
        .and_then(|v| v.get("Results"))
        .ok_or_else(|| SourceError::shape("bea", "response missing BEAAPI.Results"))?;

    let container = match results {
        serde_json::Value::Array(items) => items
            .first()
            .ok_or_else(|| SourceError::shape("bea", "Results array is empty"))?,
        other => other,
    };

    if let Some(error) = container.get("Error") {
        let description = error
            .get("APIErrorDescription")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown API error");
        return Err(SourceError::shape("bea", description.to_owned()));
    }

    let data = container
        .get("Data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SourceError::shape("bea", "Results missing Data array"))?;
    Ok(data.clone())
}
