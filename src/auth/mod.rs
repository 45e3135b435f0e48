use serde::{Deserialize, Serialize};

pub mod audit;
pub mod cache;
pub mod service;

pub use cache::{CacheStats, DecisionCache};
pub use service::AuthorizationService;

/// The resource an action is directed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_type: String,
    pub name: String,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

/// The caller context an action is attempted under.
///
/// Every field here participates in both key equality and the payload sent
/// to the policy service; adding a field to one without the other breaks
/// cache correctness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub principal: String,
    pub client_address: Option<String>,
}

impl SessionContext {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            client_address: None,
        }
    }

    pub fn with_client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }
}

/// One authorization question: may `session` perform `operation` on
/// `resource`?
///
/// Equality and hashing are structural, so the request doubles as the cache
/// key: two requests describing the same attempted action map to the same
/// cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub operation: String,
    pub resource: Resource,
    pub session: SessionContext,
}

impl DecisionRequest {
    pub fn new(operation: impl Into<String>, resource: Resource, session: SessionContext) -> Self {
        Self {
            operation: operation.into(),
            resource,
            session,
        }
    }
}
