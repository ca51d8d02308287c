use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Upper bound for a single store call before it is reported as a retryable failure.
    pub store_timeout: Duration,
    /// Period of the expiration pass. The first pass runs one period after startup.
    pub expiration_interval: Duration,
    /// UTC time of day for the daily counts report.
    pub daily_maintenance_at: NaiveTime,
    /// Optional path for structured JSON logs in addition to the console.
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = SecretString::new(get_env::<String>("DATABASE_URL").into());
        let database_max_connections: u32 = get_env_default("DATABASE_MAX_CONNECTIONS", 5);
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3002)));
        let store_timeout_secs: u64 = get_env_default("STORE_TIMEOUT_SECS", 10);
        let expiration_interval_secs: u64 = get_env_default("EXPIRATION_INTERVAL_SECS", 3600);
        let daily_maintenance_at: NaiveTime =
            get_env_default("DAILY_MAINTENANCE_AT", NaiveTime::MIN);
        let log_file: Option<PathBuf> = std::env::var("LOG_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            database_url,
            database_max_connections,
            bind_addr,
            store_timeout: Duration::from_secs(store_timeout_secs.max(1)),
            expiration_interval: Duration::from_secs(expiration_interval_secs.max(1)),
            daily_maintenance_at,
            log_file,
        }
    }
}
