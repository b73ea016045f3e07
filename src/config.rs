use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;

/// Main scanner configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScanConfig {
    /// Shared HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Per-site queue defaults and process-wide limits
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Per-host overrides, keyed by host name
    #[serde(default)]
    pub sites: HashMap<String, SiteOverride>,
    /// URL result cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// CSV batch driver
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Idle keep-alive connections kept per host
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
    /// Many recipe blogs run on expired or self-signed certificates
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Milliseconds between rate-limit tokens for one site
    #[serde(default = "default_site_rate_period_ms")]
    pub site_rate_period_ms: u64,
    /// Tokens a site may bank while idle
    #[serde(default = "default_site_burst")]
    pub site_burst: u32,
    /// Concurrent fetches per site
    #[serde(default = "default_site_max_workers")]
    pub site_max_workers: usize,
    /// Concurrent fetches across all sites
    #[serde(default = "default_global_max_workers")]
    pub global_max_workers: usize,
    /// Pending URLs buffered per site before submission waits
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Results buffered on the shared output channel
    #[serde(default = "default_reply_capacity")]
    pub reply_capacity: usize,
    /// Consecutive transport failures before a site is short-circuited
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Attempts per URL for retryable outcomes (403, 411, empty body)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            site_rate_period_ms: default_site_rate_period_ms(),
            site_burst: default_site_burst(),
            site_max_workers: default_site_max_workers(),
            global_max_workers: default_global_max_workers(),
            queue_capacity: default_queue_capacity(),
            reply_capacity: default_reply_capacity(),
            failure_threshold: default_failure_threshold(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Site-specific pacing. Unset fields fall back to the scheduler defaults.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SiteOverride {
    pub rate_period_ms: Option<u64>,
    pub burst: Option<u32>,
    pub max_workers: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: default_cache_max_entries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    /// Seconds without a result before a batch stops waiting
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

// Default value functions
fn default_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_pool_max_idle_per_host() -> usize {
    2
}

fn default_pool_idle_timeout_secs() -> u64 {
    30
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_site_rate_period_ms() -> u64 {
    10_000
}

fn default_site_burst() -> u32 {
    1
}

fn default_site_max_workers() -> usize {
    4
}

fn default_global_max_workers() -> usize {
    100
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_reply_capacity() -> usize {
    1000
}

fn default_failure_threshold() -> u32 {
    50
}

fn default_max_attempts() -> u32 {
    2
}

fn default_cache_max_entries() -> usize {
    10_000
}

fn default_idle_timeout_secs() -> u64 {
    60
}

impl ScanConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE_SCAN__ prefix
    /// 2. recipe-scan.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE_SCAN__SCHEDULER__SITE_MAX_WORKERS
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("recipe-scan").required(false))
            .add_source(
                Environment::with_prefix("RECIPE_SCAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse configuration from TOML text, without consulting the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
