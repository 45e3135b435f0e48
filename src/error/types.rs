use thiserror::Error;

/// Failure to obtain a clean boolean verdict from the policy service.
///
/// These never reach `authorize` callers: the decision cache recovers them
/// by substituting the configured fallback verdict.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("policy service returned status {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("response has no \"result\" field")]
    MissingResult,

    #[error("\"result\" field is not a boolean")]
    NonBooleanResult,
}

/// Invalid configuration, reported before a cache is built.
///
/// A failed reconfiguration leaves the previously active configuration
/// serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid policy endpoint {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
