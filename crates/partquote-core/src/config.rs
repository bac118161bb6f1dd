use crate::app_config::{AppConfig, ClientConfig, Environment};
use crate::pricing::VatRate;
use crate::ConfigError;

/// Load server configuration from environment variables.
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

/// Load server configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Load client configuration, reading `.env` first.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_client_config() -> Result<ClientConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_client_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let env_vars = EnvLookup { lookup: &lookup };

    let database_url = env_vars.require("DATABASE_URL")?;
    let env = parse_environment(&env_vars.or_default("PARTQUOTE_ENV", "development"))?;

    let bind_addr: SocketAddr = env_vars.parse("PARTQUOTE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = env_vars.or_default("PARTQUOTE_LOG_LEVEL", "info");

    let db_max_connections: u32 = env_vars.parse("PARTQUOTE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections: u32 = env_vars.parse("PARTQUOTE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs: u64 =
        env_vars.parse("PARTQUOTE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let vat_rate = parse_vat_rate(&env_vars)?;
    let notify_webhook_url = lookup("PARTQUOTE_NOTIFY_WEBHOOK_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        vat_rate,
        notify_webhook_url,
    })
}

fn build_client_config<F>(lookup: F) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let env_vars = EnvLookup { lookup: &lookup };

    let api_url = env_vars.or_default("PARTQUOTE_API_URL", "http://127.0.0.1:3000");
    let request_timeout_secs: u64 = env_vars.parse("PARTQUOTE_CLIENT_TIMEOUT_SECS", "20")?;
    let max_attempts: u32 = env_vars.parse("PARTQUOTE_CLIENT_MAX_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PARTQUOTE_CLIENT_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let backoff_base_ms: u64 = env_vars.parse("PARTQUOTE_CLIENT_BACKOFF_BASE_MS", "500")?;
    let state_dir = env_vars.or_default("PARTQUOTE_STATE_DIR", "./.partquote").into();
    let vat_rate = parse_vat_rate(&env_vars)?;

    Ok(ClientConfig {
        api_url,
        request_timeout_secs,
        max_attempts,
        backoff_base_ms,
        state_dir,
        vat_rate,
    })
}

struct EnvLookup<'a, F> {
    lookup: &'a F,
}

impl<F> EnvLookup<'_, F>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    fn require(&self, var: &str) -> Result<String, ConfigError> {
        (self.lookup)(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    }

    fn or_default(&self, var: &str, default: &str) -> String {
        (self.lookup)(var).unwrap_or_else(|_| default.to_string())
    }

    fn parse<T>(&self, var: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.or_default(var, default);
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    }
}

fn parse_vat_rate<F>(env_vars: &EnvLookup<'_, F>) -> Result<VatRate, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = env_vars.or_default("PARTQUOTE_VAT_RATE", &VatRate::STANDARD.to_string());
    raw.parse::<VatRate>()
        .map_err(|reason| ConfigError::InvalidEnvVar {
            var: "PARTQUOTE_VAT_RATE".to_string(),
            reason,
        })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PARTQUOTE_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
