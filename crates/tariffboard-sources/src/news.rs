//! Client for the NewsAPI `/v2/everything` endpoint.
//!
//! Coverage comes from querying every pairing of a primary trade term with an
//! action signal word (`"tariff" "imposed"`, `"trade war" "announced"`, ...)
//! and merging the results, deduplicated by article URL. A single broad query
//! misses too many articles; the pairing forces NewsAPI to return pieces that
//! describe an actual action, not just background coverage.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::retry::retry_with_backoff;
use crate::wto::retry_after_secs;
use crate::FetchPolicy;

const DEFAULT_BASE_URL: &str = "https://newsapi.org";

const PRIMARY_KEYWORDS: &[&str] = &[
    "tariff",
    "import duty",
    "trade war",
    "trade deficit",
    "customs duty",
    "trade barrier",
    "de minimis",
];

const SIGNAL_WORDS: &[&str] = &[
    "imposed",
    "announced",
    "implemented",
    "removed",
    "increased",
    "decreased",
    "retaliated",
    "responded",
    "exempted",
    "eliminated",
];

const ARTICLES_PER_QUERY: u32 = 10;

/// One article as returned by NewsAPI, before classification.
#[derive(Debug, Clone, Deserialize)]
pub struct RawArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub url: String,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
    #[serde(rename = "source", default, deserialize_with = "source_name")]
    pub source_name: Option<String>,
    /// The query pairing that surfaced this article. Not part of the API
    /// response; filled in after fetch.
    #[serde(skip)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

fn source_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Source {
        #[serde(default)]
        name: Option<String>,
    }
    let source = Option::<Source>::deserialize(deserializer)?;
    Ok(source.and_then(|s| s.name))
}

pub struct NewsClient {
    client: Client,
    api_key: String,
    base_url: Url,
    policy: FetchPolicy,
}

impl NewsClient {
    /// Creates a client pointed at the production NewsAPI.
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
            .map_err(|e| SourceError::shape("news", format!("invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            policy,
        })
    }

    /// Fetches articles for every keyword pairing and merges them.
    ///
    /// Articles keep the order in which they were first seen, so earlier
    /// pairings win the URL dedup. A failed pairing is logged and skipped; a
    /// rate-limit response stops the sweep and returns what was collected so
    /// far, since every remaining pairing would hit the same limit.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] only if every pairing fails.
    pub async fn fetch_tariff_articles(&self) -> Result<Vec<RawArticle>, SourceError> {
        let mut seen_urls = HashSet::new();
        let mut articles = Vec::new();
        let mut last_err = None;
        let mut any_ok = false;

        'sweep: for primary in PRIMARY_KEYWORDS {
            for signal in SIGNAL_WORDS {
                let query = format!("\"{primary}\" \"{signal}\"");
                match self.fetch_query(&query).await {
                    Ok(batch) => {
                        any_ok = true;
                        for mut article in batch {
                            if seen_urls.insert(article.url.clone()) {
                                article.query = query.clone();
                                articles.push(article);
                            }
                        }
                    }
                    Err(err @ SourceError::RateLimited { .. }) => {
                        tracing::warn!(error = %err, query, "news API rate limited, stopping sweep");
                        last_err = Some(err);
                        break 'sweep;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, query, "news query failed, continuing");
                        last_err = Some(err);
                    }
                }
            }
        }

        match (any_ok, last_err) {
            (false, Some(err)) => Err(err),
            _ => {
                tracing::info!(count = articles.len(), "merged news articles after dedup");
                Ok(articles)
            }
        }
    }

    async fn fetch_query(&self, query: &str) -> Result<Vec<RawArticle>, SourceError> {
        let mut url = self
            .base_url
            .join("v2/everything")
            .map_err(|e| SourceError::shape("news", format!("invalid path: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("language", "en");
            pairs.append_pair("sortBy", "publishedAt");
            pairs.append_pair("pageSize", &ARTICLES_PER_QUERY.to_string());
            pairs.append_pair("page", "1");
            pairs.append_pair("apiKey", &self.api_key);
        }

        let response =
            retry_with_backoff(self.policy.max_retries, self.policy.backoff_base_ms, || {
                self.request(url.clone())
            })
            .await?;

        if response.status != "ok" {
            return Err(SourceError::shape(
                "news",
                format!(
                    "API error {}: {}",
                    response.code.unwrap_or_default(),
                    response.message.unwrap_or_default()
                ),
            ));
        }
        Ok(response.articles)
    }

    async fn request(&self, url: Url) -> Result<EverythingResponse, SourceError> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited {
                    source_name: "news",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_deserializes_with_nested_source_name() {
        let json = r#"{
            "source": {"id": null, "name": "Reuters"},
            "title": "US imposes new tariff",
            "description": "A 25% tariff was imposed.",
            "content": null,
            "url": "https://example.com/a",
            "publishedAt": "2025-03-01T12:00:00Z"
        }"#;
        let article: RawArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.source_name.as_deref(), Some("Reuters"));
        assert_eq!(article.title.as_deref(), Some("US imposes new tariff"));
        assert!(article.content.is_none());
    }

    #[test]
    fn article_tolerates_missing_source() {
        let json = r#"{"url": "https://example.com/b"}"#;
        let article: RawArticle = serde_json::from_str(json).unwrap();
        assert!(article.source_name.is_none());
    }

    #[test]
    fn error_response_deserializes() {
        let json = r#"{"status": "error", "code": "apiKeyInvalid", "message": "bad key"}"#;
        let response: EverythingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, "error");
        assert_eq!(response.code.as_deref(), Some("apiKeyInvalid"));
        assert!(response.articles.is_empty());
    }
}
