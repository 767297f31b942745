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
    pub clients_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Base URL of the ads platform Graph-style API, including the version segment.
    pub ads_api_base_url: String,
    /// Long-lived access token for the ads platform; collection is disabled without it.
    pub ads_access_token: Option<String>,
    pub ads_request_timeout_secs: u64,
    pub ads_max_retries: u32,
    pub ads_retry_backoff_base_ms: u64,
    /// Pause between clients during a batch refresh.
    pub refresh_delay_ms: u64,
    /// Ring-buffer size for the pipeline recorder.
    pub recorder_capacity: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("clients_path", &self.clients_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("ads_api_base_url", &self.ads_api_base_url)
            .field(
                "ads_access_token",
                &self.ads_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("ads_request_timeout_secs", &self.ads_request_timeout_secs)
            .field("ads_max_retries", &self.ads_max_retries)
            .field("ads_retry_backoff_base_ms", &self.ads_retry_backoff_base_ms)
            .field("refresh_delay_ms", &self.refresh_delay_ms)
            .field("recorder_capacity", &self.recorder_capacity)
            .finish()
    }
}
