//! Remote policy-evaluation client
//!
//! One POST per cache miss: the decision request is wrapped in a policy-input
//! envelope, and the verdict comes back as a boolean under `"result"`. There
//! are no retries; a miss is expected to cost one sub-second round trip.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::trace;

use crate::auth::DecisionRequest;
use crate::config::AuthzConfig;
use crate::error::{ConfigError, RemoteError};

/// Policy-input envelope: a single object with the request under `"input"`.
#[derive(Serialize)]
struct EvaluateEnvelope<'a> {
    input: &'a DecisionRequest,
}

/// The seam between the cache and whatever answers policy questions.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    /// Ask for a verdict on one request.
    ///
    /// Returns `RemoteError` on any network, timeout, HTTP-status or
    /// malformed-response condition; never coerces a failure to a default
    /// verdict — that call belongs to the cache's fallback policy.
    async fn evaluate(&self, request: &DecisionRequest) -> Result<bool, RemoteError>;
}

/// HTTP implementation of [`DecisionClient`].
pub struct HttpDecisionClient {
    http: reqwest::Client,
    url: reqwest::Url,
    bearer_token: Option<String>,
}

impl HttpDecisionClient {
    pub fn new(config: &AuthzConfig) -> Result<Self, ConfigError> {
        let url = reqwest::Url::parse(&config.url).map_err(|e| ConfigError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            url,
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl DecisionClient for HttpDecisionClient {
    async fn evaluate(&self, request: &DecisionRequest) -> Result<bool, RemoteError> {
        let mut call = self
            .http
            .post(self.url.clone())
            .json(&EvaluateEnvelope { input: request });

        if let Some(token) = &self.bearer_token {
            call = call.bearer_auth(token);
        }

        let response = call.send().await?;
        let status = response.status();

        trace!(
            status = status.as_u16(),
            principal = %request.session.principal,
            operation = %request.operation,
            "policy service responded"
        );

        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        decision_from_body(&response.text().await?)
    }
}

/// Extract the boolean verdict from a policy response body.
///
/// Additional fields are ignored; anything short of a JSON object carrying
/// `"result": <bool>` is an error.
pub fn decision_from_body(body: &str) -> Result<bool, RemoteError> {
    let value: serde_json::Value = serde_json::from_str(body)?;

    match value.get("result") {
        Some(serde_json::Value::Bool(allowed)) => Ok(*allowed),
        Some(_) => Err(RemoteError::NonBooleanResult),
        None => Err(RemoteError::MissingResult),
    }
}

/// Scripted client for tests and embedded hosts.
///
/// Counts calls, optionally delays each one, and can be flipped into a
/// failing mode at runtime.
pub struct MockDecisionClient {
    allow: bool,
    failing: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockDecisionClient {
    pub fn allowing(allow: bool) -> Self {
        Self {
            allow,
            failing: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `evaluate` calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionClient for MockDecisionClient {
    async fn evaluate(&self, _request: &DecisionRequest) -> Result<bool, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Status(503));
        }

        Ok(self.allow)
    }
}
