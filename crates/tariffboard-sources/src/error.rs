use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {source_name} (retry after {retry_after_secs}s)")]
    RateLimited {
        source_name: &'static str,
        retry_after_secs: u64,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("malformed {source_name} response: {reason}")]
    Shape {
        source_name: &'static str,
        reason: String,
    },

    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
}

impl SourceError {
    pub fn shape(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Shape {
            source_name,
            reason: reason.into(),
        }
    }
}
