use std::net::SocketAddr;
use std::path::PathBuf;

use crate::pricing::VatRate;

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

/// Server-side configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub vat_rate: VatRate,
    pub notify_webhook_url: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("vat_rate", &self.vat_rate)
            .field(
                "notify_webhook_url",
                &self.notify_webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Configuration for the API client and the CLI that drives it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Root directory of the local keyed store (tokens, drafts).
    pub state_dir: PathBuf,
    pub vat_rate: VatRate,
}
