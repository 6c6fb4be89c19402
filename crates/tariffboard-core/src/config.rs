use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = or_default("DATABASE_URL", "sqlite://./data/tariffboard.sqlite?mode=rwc");

    let env = parse_environment(&or_default("TARIFFBOARD_ENV", "development"));

    let bind_addr = parse_addr("TARIFFBOARD_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("TARIFFBOARD_LOG_LEVEL", "info");
    let data_dir = PathBuf::from(or_default("TARIFFBOARD_DATA_DIR", "./data"));

    // API keys are optional: a missing key disables that collector for the
    // cycle rather than failing startup.
    let census_api_key = lookup("CENSUS_API_KEY").ok();
    let bea_api_key = lookup("BEA_API_KEY").ok();
    let wto_api_key = lookup("WTO_API_KEY").ok();
    let news_api_key = lookup("NEWSAPI_KEY").ok();

    let db_max_connections = parse_u32("TARIFFBOARD_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TARIFFBOARD_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TARIFFBOARD_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let source_request_timeout_secs = parse_u64("TARIFFBOARD_SOURCE_TIMEOUT_SECS", "30")?;
    let source_max_retries = parse_u32("TARIFFBOARD_SOURCE_MAX_RETRIES", "3")?;
    let source_backoff_base_ms = parse_u64("TARIFFBOARD_SOURCE_BACKOFF_BASE_MS", "1000")?;
    let cache_ttl_secs = parse_u64("TARIFFBOARD_CACHE_TTL_SECS", "86400")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        data_dir,
        census_api_key,
        bea_api_key,
        wto_api_key,
        news_api_key,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        source_request_timeout_secs,
        source_max_retries,
        source_backoff_base_ms,
        cache_ttl_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn parse_environment_production() {
        assert_eq!(parse_environment("production"), Environment::Production);
    }

    #[test]
    fn parse_environment_unknown_defaults_to_development() {
        assert_eq!(parse_environment("staging"), Environment::Development);
    }

    #[test]
    fn build_app_config_succeeds_with_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let result = build_app_config(lookup_from_map(&map));
        assert!(result.is_ok(), "expected Ok, got: {result:?}");
        let cfg = result.unwrap();
        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3000");
        assert!(cfg.news_api_key.is_none());
        assert_eq!(cfg.source_max_retries, 3);
        assert_eq!(cfg.cache_ttl_secs, 86_400);
    }

    #[test]
    fn build_app_config_fails_with_invalid_bind_addr() {
        let mut map: HashMap<&str, &str> = HashMap::new();
        map.insert("TARIFFBOARD_BIND_ADDR", "not-a-socket-addr");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TARIFFBOARD_BIND_ADDR"),
            "expected InvalidEnvVar(TARIFFBOARD_BIND_ADDR), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_fails_with_non_numeric_retries() {
        let mut map: HashMap<&str, &str> = HashMap::new();
        map.insert("TARIFFBOARD_SOURCE_MAX_RETRIES", "many");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TARIFFBOARD_SOURCE_MAX_RETRIES"),
            "expected InvalidEnvVar(TARIFFBOARD_SOURCE_MAX_RETRIES), got: {result:?}"
        );
    }

    #[test]
    fn api_keys_are_read_when_present() {
        let mut map: HashMap<&str, &str> = HashMap::new();
        map.insert("NEWSAPI_KEY", "abc");
        map.insert("WTO_API_KEY", "def");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.news_api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.wto_api_key.as_deref(), Some("def"));
        assert!(cfg.bea_api_key.is_none());
    }

    #[test]
    fn snapshot_path_lives_under_data_dir() {
        let mut map: HashMap<&str, &str> = HashMap::new();
        map.insert("TARIFFBOARD_DATA_DIR", "/var/lib/tariffboard");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(
            cfg.snapshot_path(),
            std::path::Path::new("/var/lib/tariffboard/api/dashboard_data.json")
        );
    }
}
