use std::collections::BTreeMap;
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
    pub env: Environment,
    pub log_level: String,
    pub request_timeout_secs: u64,
    /// Log response header names alongside URL/status/size.
    pub log_responses: bool,
    /// Logical proxy country (`"DE"`, `"SE"`, ...) to proxy URL, credentials included.
    pub proxies: BTreeMap<String, String>,
    pub max_concurrent_countries: usize,
    pub max_concurrent_retailers: usize,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    pub inter_request_delay_ms: u64,
    pub pricerunner_pause_min_secs: u64,
    pub pricerunner_pause_max_secs: u64,
    pub resolver_max_nodes: usize,
    pub resolver_cache_dir: PathBuf,
    pub html_dump_dir: PathBuf,
    pub kelkoo_jwt_token: Option<String>,
    pub priceapi_api_key: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_responses", &self.log_responses)
            .field("proxies", &self.proxies.keys().collect::<Vec<_>>())
            .field("max_concurrent_countries", &self.max_concurrent_countries)
            .field("max_concurrent_retailers", &self.max_concurrent_retailers)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_secs", &self.retry_backoff_base_secs)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field(
                "pricerunner_pause_secs",
                &(self.pricerunner_pause_min_secs, self.pricerunner_pause_max_secs),
            )
            .field("resolver_max_nodes", &self.resolver_max_nodes)
            .field("resolver_cache_dir", &self.resolver_cache_dir)
            .field("html_dump_dir", &self.html_dump_dir)
            .field(
                "kelkoo_jwt_token",
                &self.kelkoo_jwt_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "priceapi_api_key",
                &self.priceapi_api_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
