//! authz-gate: caching authorization decision layer
//!
//! Given a description of an attempted action — an operation, a resource and
//! the session attempting it — this crate answers allow/deny, consulting a
//! remote policy-evaluation service only when no fresh cached answer exists.
//!
//! # Features
//!
//! - **Decision cache**: bounded, write-TTL cache keyed by the structural
//!   value of the request
//! - **Single-flight loads**: concurrent misses for the same key collapse
//!   into one remote call
//! - **Fail-open / fail-closed**: a configurable fallback verdict when the
//!   policy service cannot answer
//! - **Hot reconfiguration**: a new config atomically replaces the active
//!   cache instance
//!
//! # Example
//!
//! ```rust,ignore
//! use authz_gate::{AuthorizationService, AuthzConfig, DecisionRequest, Resource, SessionContext};
//!
//! let config = AuthzConfig {
//!     url: "http://localhost:8181/v1/data/authz/allow".to_string(),
//!     ..Default::default()
//! };
//! let service = AuthorizationService::new(config)?;
//!
//! let request = DecisionRequest::new(
//!     "Read",
//!     Resource::new("Topic", "payments"),
//!     SessionContext::new("alice").with_client_address("10.0.0.7"),
//! );
//!
//! if service.authorize(&request).await {
//!     // proceed with the action
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod observability;
pub mod services;

pub use auth::{
    AuthorizationService, CacheStats, DecisionCache, DecisionRequest, Resource, SessionContext,
};
pub use config::{AppConfig, AuthzConfig, LoggingConfig, load_config};
pub use error::{ConfigError, RemoteError};
pub use services::policy::{DecisionClient, HttpDecisionClient, MockDecisionClient};
