//! Client for the whitehouse.gov presidential actions feed.
//!
//! whitehouse.gov is a WordPress site, so posts are read from the
//! `wp-json/wp/v2` REST API instead of scraping the HTML listing pages. Post
//! bodies arrive as rendered HTML; [`strip_html`] reduces them to plain text
//! for downstream keyword classification.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::error::SourceError;
use crate::retry::retry_with_backoff;
use crate::wto::retry_after_secs;
use crate::FetchPolicy;

const DEFAULT_BASE_URL: &str = "https://www.whitehouse.gov";
const POSTS_PER_PAGE: u32 = 20;
const MAX_PAGES: u32 = 10;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// One presidential action with its body already reduced to plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnnouncement {
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct WpPost {
    link: String,
    #[serde(default)]
    date: Option<String>,
    title: WpRendered,
    content: WpRendered,
}

#[derive(Debug, Default, Deserialize)]
struct WpRendered {
    #[serde(default)]
    rendered: String,
}

pub struct WhiteHouseClient {
    client: Client,
    base_url: Url,
    policy: FetchPolicy,
}

impl WhiteHouseClient {
    /// Creates a client pointed at the live whitehouse.gov feed.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(policy: FetchPolicy) -> Result<Self, SourceError> {
        Self::with_base_url(policy, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the client cannot be constructed, or
    /// [`SourceError::Shape`] if `base_url` is not a valid URL.
    pub fn with_base_url(policy: FetchPolicy, base_url: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(policy.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tariffboard/0.1 (trade-data-aggregation)")
            .build()?;

        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| SourceError::shape("whitehouse", format!("invalid base URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            policy,
        })
    }

    /// Fetches presidential actions, newest first, up to [`MAX_PAGES`] pages.
    ///
    /// WordPress answers a page number past the end with HTTP 400, which is
    /// treated as the natural end of pagination rather than a failure.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the first page cannot be fetched; later
    /// page failures are logged and truncate the result.
    pub async fn fetch_presidential_actions(&self) -> Result<Vec<RawAnnouncement>, SourceError> {
        let mut announcements = Vec::new();

        for page in 1..=MAX_PAGES {
            let posts = match self.fetch_page(page).await {
                Ok(Some(posts)) => posts,
                Ok(None) => break,
                Err(err) if page == 1 => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, page, "whitehouse page fetch failed, truncating");
                    break;
                }
            };
            if posts.is_empty() {
                break;
            }
            let count = posts.len();
            for post in posts {
                announcements.push(RawAnnouncement {
                    title: strip_html(&post.title.rendered),
                    url: post.link,
                    published_at: post.date.unwrap_or_default(),
                    body: strip_html(&post.content.rendered),
                });
            }
            if count < POSTS_PER_PAGE as usize {
                break;
            }
        }

        tracing::info!(
            count = announcements.len(),
            "fetched presidential actions"
        );
        Ok(announcements)
    }

    /// Returns `Ok(None)` when pagination has run past the last page.
    async fn fetch_page(&self, page: u32) -> Result<Option<Vec<WpPost>>, SourceError> {
        let mut url = self
            .base_url
            .join("wp-json/wp/v2/presidential-actions")
            .map_err(|e| SourceError::shape("whitehouse", format!("invalid path: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("per_page", &POSTS_PER_PAGE.to_string());
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("orderby", "date");
            pairs.append_pair("order", "desc");
        }

        retry_with_backoff(self.policy.max_retries, self.policy.backoff_base_ms, || {
            self.request_page(url.clone())
        })
        .await
    }

    async fn request_page(&self, url: Url) -> Result<Option<Vec<WpPost>>, SourceError> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::BAD_REQUEST => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited {
                    source_name: "whitehouse",
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
        let posts = serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
            context: url.to_string(),
            source: e,
        })?;
        Ok(Some(posts))
    }
}

/// Drops HTML tags, decodes the entities WordPress actually emits, and
/// collapses whitespace.
fn strip_html(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#8217;", "'")
        .replace("&#8216;", "'")
        .replace("&#8220;", "\"")
        .replace("&#8221;", "\"")
        .replace("&#8211;", "-")
        .replace("&#8212;", "-")
        .replace("&nbsp;", " ");
    WS_RE.replace_all(text.trim(), " ").into_owned()
}
