use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
pub struct AppConfig {
    #[garde(dive)]
    #[serde(default)]
    pub authz: AuthzConfig,

    #[garde(dive)]
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Immutable configuration snapshot for the authorization layer.
///
/// Constructed once at startup or on an explicit reconfiguration event;
/// a reconfiguration builds a whole new cache instance from a new snapshot
/// rather than mutating the live one.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AuthzConfig {
    /// Policy service decision endpoint
    #[garde(length(min = 1), custom(validate_endpoint))]
    #[serde(default = "default_url")]
    pub url: String,

    /// Optional bearer token attached to every policy request
    #[garde(skip)]
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Verdict applied when the policy service cannot answer
    #[garde(skip)]
    #[serde(default)]
    pub fail_open: bool,

    #[garde(skip)]
    #[serde(default = "default_initial_capacity")]
    pub cache_initial_capacity: usize,

    /// Entry bound; 0 disables storage
    #[garde(skip)]
    #[serde(default = "default_maximum_size")]
    pub cache_maximum_size: usize,

    /// Write-time TTL in milliseconds; 0 disables caching
    #[garde(skip)]
    #[serde(default = "default_expire_after_ms")]
    pub cache_expire_after_ms: u64,

    #[garde(range(min = 1, max = 60_000))]
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_url() -> String {
    "http://localhost:8181".to_string()
}

fn default_initial_capacity() -> usize {
    100
}

fn default_maximum_size() -> usize {
    100
}

fn default_expire_after_ms() -> u64 {
    600_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            bearer_token: None,
            fail_open: false,
            cache_initial_capacity: 100,
            cache_maximum_size: 100,
            cache_expire_after_ms: 600_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl AuthzConfig {
    pub fn expire_after(&self) -> Duration {
        Duration::from_millis(self.cache_expire_after_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoggingConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String, // trace, debug, info, warn, error

    #[garde(pattern(r"^(json|pretty)$"))]
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

fn validate_endpoint(value: &str, _: &()) -> garde::Result {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|_| garde::Error::new("not a valid URL"))
}
