//! Authorization entry point
//!
//! The stable seam host glue calls. It owns the active cache instance and
//! swaps it wholesale on reconfiguration, so call sites never see a cache in
//! a half-configured state: in-flight lookups finish against the instance
//! they started on.

use std::sync::{Arc, RwLock};

use garde::Validate;
use tracing::info;

use crate::auth::DecisionRequest;
use crate::auth::cache::{CacheStats, DecisionCache};
use crate::config::AuthzConfig;
use crate::error::ConfigError;
use crate::services::policy::{DecisionClient, HttpDecisionClient};

pub struct AuthorizationService {
    active: RwLock<Arc<DecisionCache>>,
}

impl AuthorizationService {
    /// Validate `config` and build the HTTP client + cache pair behind the
    /// service.
    pub fn new(config: AuthzConfig) -> Result<Self, ConfigError> {
        let cache = build_cache(&config)?;
        Ok(Self {
            active: RwLock::new(Arc::new(cache)),
        })
    }

    /// Build the service around an externally supplied client — tests, or
    /// hosts with their own transport.
    pub fn with_client(
        config: AuthzConfig,
        client: Arc<dyn DecisionClient>,
    ) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self {
            active: RwLock::new(Arc::new(DecisionCache::new(&config, client))),
        })
    }

    /// Answer one authorization question. Never fails: remote trouble
    /// resolves to the configured fallback verdict inside the cache.
    pub async fn authorize(&self, request: &DecisionRequest) -> bool {
        let cache = self.active.read().unwrap().clone();
        cache.get(request).await
    }

    /// Apply a new configuration by atomically replacing the cache (and its
    /// client). Previous entries are discarded. On validation failure the
    /// prior configuration keeps serving.
    pub fn reconfigure(&self, config: AuthzConfig) -> Result<(), ConfigError> {
        let cache = build_cache(&config)?;
        self.swap(config, cache);
        Ok(())
    }

    /// [`reconfigure`](Self::reconfigure) with an externally supplied client.
    pub fn reconfigure_with_client(
        &self,
        config: AuthzConfig,
        client: Arc<dyn DecisionClient>,
    ) -> Result<(), ConfigError> {
        validate(&config)?;
        let cache = DecisionCache::new(&config, client);
        self.swap(config, cache);
        Ok(())
    }

    /// Counters of the active cache instance.
    pub fn stats(&self) -> CacheStats {
        self.active.read().unwrap().stats()
    }

    fn swap(&self, config: AuthzConfig, cache: DecisionCache) {
        *self.active.write().unwrap() = Arc::new(cache);
        info!(
            url = %config.url,
            fail_open = config.fail_open,
            maximum_size = config.cache_maximum_size,
            expire_after_ms = config.cache_expire_after_ms,
            "authorization cache rebuilt"
        );
    }
}

fn build_cache(config: &AuthzConfig) -> Result<DecisionCache, ConfigError> {
    validate(config)?;
    let client: Arc<dyn DecisionClient> = Arc::new(HttpDecisionClient::new(config)?);
    Ok(DecisionCache::new(config, client))
}

fn validate(config: &AuthzConfig) -> Result<(), ConfigError> {
    config
        .validate()
        .map_err(|report| ConfigError::Invalid(report.to_string()))
}
