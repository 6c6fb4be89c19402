use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub data_dir: PathBuf,
    pub census_api_key: Option<String>,
    pub bea_api_key: Option<String>,
    pub wto_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub source_request_timeout_secs: u64,
    pub source_max_retries: u32,
    pub source_backoff_base_ms: u64,
    pub cache_ttl_secs: u64,
}

impl AppConfig {
    /// Directory the snapshot artifact is published into.
    #[must_use]
    pub fn api_dir(&self) -> PathBuf {
        self.data_dir.join("api")
    }

    /// Path of the denormalized dashboard snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.api_dir().join("dashboard_data.json")
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("data_dir", &self.data_dir)
            .field("database_url", &"[redacted]")
            .field(
                "census_api_key",
                &self.census_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "bea_api_key",
                &self.bea_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "wto_api_key",
                &self.wto_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "news_api_key",
                &self.news_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "source_request_timeout_secs",
                &self.source_request_timeout_secs,
            )
            .field("source_max_retries", &self.source_max_retries)
            .field("source_backoff_base_ms", &self.source_backoff_base_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .finish()
    }
}
