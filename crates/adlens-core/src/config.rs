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
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the process environment so tests can drive it
/// with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("ADLENS_ENV", "development"))?;
    let bind_addr = parse_addr("ADLENS_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("ADLENS_LOG_LEVEL", "info");
    let clients_path = PathBuf::from(or_default("ADLENS_CLIENTS_PATH", "./config/clients.yaml"));

    let db_max_connections = parse_u32("ADLENS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("ADLENS_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("ADLENS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let ads_api_base_url = or_default("ADS_API_BASE_URL", "https://graph.facebook.com/v19.0/");
    let ads_access_token = lookup("ADS_ACCESS_TOKEN").ok().filter(|t| !t.is_empty());
    let ads_request_timeout_secs = parse_u64("ADS_REQUEST_TIMEOUT_SECS", "30")?;
    let ads_max_retries = parse_u32("ADS_MAX_RETRIES", "3")?;
    let ads_retry_backoff_base_ms = parse_u64("ADS_RETRY_BACKOFF_BASE_MS", "2000")?;

    let refresh_delay_ms = parse_u64("ADLENS_REFRESH_DELAY_MS", "500")?;
    let recorder_capacity = parse_usize("ADLENS_RECORDER_CAPACITY", "256")?;
    if recorder_capacity == 0 {
        return Err(invalid(
            "ADLENS_RECORDER_CAPACITY",
            "must be greater than zero".to_string(),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        clients_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        ads_api_base_url,
        ads_access_token,
        ads_request_timeout_secs,
        ads_max_retries,
        ads_retry_backoff_base_ms,
        refresh_delay_ms,
        recorder_capacity,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ADLENS_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
