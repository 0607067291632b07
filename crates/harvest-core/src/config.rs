use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
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
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function,
/// so parsing can be tested against a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let env = parse_environment(&or_default("HARVEST_ENV", "development"))?;
    let log_level = or_default("HARVEST_LOG_LEVEL", "info");
    let seeds_path = PathBuf::from(or_default("HARVEST_SEEDS_PATH", "./config/seeds.yaml"));

    let request_timeout_secs = parse_num(
        "HARVEST_REQUEST_TIMEOUT_SECS",
        &or_default("HARVEST_REQUEST_TIMEOUT_SECS", "30"),
    )?;
    let user_agent = or_default("HARVEST_USER_AGENT", "harvest/0.1 (catalog-harvester)");
    let max_concurrent_tasks: usize = parse_num(
        "HARVEST_MAX_CONCURRENT_TASKS",
        &or_default("HARVEST_MAX_CONCURRENT_TASKS", "4"),
    )?;
    let inter_request_delay_ms = parse_num(
        "HARVEST_INTER_REQUEST_DELAY_MS",
        &or_default("HARVEST_INTER_REQUEST_DELAY_MS", "250"),
    )?;
    let max_retries = parse_num(
        "HARVEST_MAX_RETRIES",
        &or_default("HARVEST_MAX_RETRIES", "3"),
    )?;
    let retry_backoff_base_secs = parse_num(
        "HARVEST_RETRY_BACKOFF_BASE_SECS",
        &or_default("HARVEST_RETRY_BACKOFF_BASE_SECS", "5"),
    )?;
    let max_requests_per_task: usize = parse_num(
        "HARVEST_MAX_REQUESTS_PER_TASK",
        &or_default("HARVEST_MAX_REQUESTS_PER_TASK", "500"),
    )?;

    if max_concurrent_tasks == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "HARVEST_MAX_CONCURRENT_TASKS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if max_requests_per_task == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "HARVEST_MAX_REQUESTS_PER_TASK".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        log_level,
        seeds_path,
        request_timeout_secs,
        user_agent,
        max_concurrent_tasks,
        inter_request_delay_ms,
        max_retries,
        retry_backoff_base_secs,
        max_requests_per_task,
    })
}

fn parse_num<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "HARVEST_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
