use serde::Deserialize;

/// Main configuration structure for linkrot
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Key-value store connection and check-flag lifetime
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Store connection URL
    #[serde(rename = "redis-url", default = "default_redis_url")]
    pub redis_url: String,

    /// Seconds before an abandoned check-flag expires on its own
    #[serde(rename = "check-flag-ttl", default = "default_check_flag_ttl")]
    pub check_flag_ttl: u64,
}

/// Outbound probe behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// HEAD probe timeout in seconds
    #[serde(rename = "head-timeout", default = "default_head_timeout")]
    pub head_timeout: u64,

    /// GET fallback timeout in seconds
    #[serde(rename = "get-timeout", default = "default_get_timeout")]
    pub get_timeout: u64,

    /// Domains known to mishandle HEAD, probed with GET from the start
    #[serde(rename = "get-only-domains", default)]
    pub get_only_domains: Vec<String>,

    /// Upper bound on probes in flight at once
    #[serde(rename = "max-concurrent-probes", default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

/// Callback delivery behavior
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Delivery attempts per callback before giving up
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Seconds to wait before the first retry
    #[serde(rename = "base-delay", default = "default_base_delay")]
    pub base_delay: u64,

    /// Multiplier applied to the delay after each failed attempt
    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: u32,

    /// Seconds allowed to establish the callback connection
    #[serde(rename = "connect-timeout", default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Seconds allowed for the whole callback request
    #[serde(rename = "total-timeout", default = "default_total_timeout")]
    pub total_timeout: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_check_flag_ttl() -> u64 {
    600
}

fn default_head_timeout() -> u64 {
    10
}

fn default_get_timeout() -> u64 {
    180
}

fn default_max_concurrent_probes() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    10
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_connect_timeout() -> u64 {
    3
}

fn default_total_timeout() -> u64 {
    9
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            check_flag_ttl: default_check_flag_ttl(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            head_timeout: default_head_timeout(),
            get_timeout: default_get_timeout(),
            get_only_domains: Vec::new(),
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            backoff_factor: default_backoff_factor(),
            connect_timeout: default_connect_timeout(),
            total_timeout: default_total_timeout(),
        }
    }
}
