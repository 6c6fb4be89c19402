//! HTTP clients for the five external tariff/trade data sources.
//!
//! Each client wraps `reqwest` with source-specific error handling, bounded
//! retry with exponential back-off, and a typed response-shape adapter that
//! localizes the upstream API's envelope quirks to one function. Collectors
//! are intentionally thin: they fetch and shape records, and leave relevance
//! filtering and persistence to the pipeline crate.

mod bea;
mod census;
mod error;
mod news;
mod retry;
mod whitehouse;
mod wto;

pub use bea::{BeaClient, BeaGdpRow, BeaItaRow};
pub use census::{
    AnnualTradePoint, CensusClient, CensusDashboard, DistrictTrade, HsChapterValue,
};
pub use error::SourceError;
pub use news::{NewsClient, RawArticle};
pub use whitehouse::{RawAnnouncement, WhiteHouseClient};
pub use wto::{WtoClient, WtoIndicator, WtoTariffRow};

/// Retry/timeout knobs shared by every source client.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}
