//! Decision cache
//!
//! Concurrent, bounded, time-expiring cache over the remote policy client.
//! Per key the lifecycle is absent -> loading -> present -> absent again on
//! expiry or eviction, with concurrent misses for one key collapsed into a
//! single in-flight load.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::warn;

use crate::auth::DecisionRequest;
use crate::auth::audit::audit_decision;
use crate::config::AuthzConfig;
use crate::observability::metrics::record_decision;
use crate::services::policy::DecisionClient;

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecisionSource {
    Cache,
    Remote,
    Fallback,
}

impl DecisionSource {
    fn as_str(self) -> &'static str {
        match self {
            DecisionSource::Cache => "cache",
            DecisionSource::Remote => "remote",
            DecisionSource::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    allow: bool,
    inserted_at: Instant,
    expires_at: Instant,
}

/// Counters for monitoring cache behavior.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evictions: u64,
    pub remote_errors: u64,
    /// Current number of cached entries
    pub entries: u64,
}

struct CacheState {
    entries: HashMap<DecisionRequest, CacheEntry>,
    /// Keys with a load in flight, each with the waiters to notify
    pending: HashMap<DecisionRequest, Vec<oneshot::Sender<(bool, &'static str)>>>,
    stats: CacheStats,
}

/// Load-or-compute decision cache.
///
/// `get` never fails outwardly: a remote failure is logged, counted, and
/// resolved to the configured fallback verdict without being cached, so the
/// next lookup for that key retries the policy service.
pub struct DecisionCache {
    client: Arc<dyn DecisionClient>,
    ttl: Duration,
    maximum_size: usize,
    fail_open: bool,
    state: Mutex<CacheState>,
}

impl DecisionCache {
    pub fn new(config: &AuthzConfig, client: Arc<dyn DecisionClient>) -> Self {
        Self {
            client,
            ttl: config.expire_after(),
            maximum_size: config.cache_maximum_size,
            fail_open: config.fail_open,
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(config.cache_initial_capacity),
                pending: HashMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Answer one authorization question, loading through the policy client
    /// on a miss.
    ///
    /// Concurrent calls for the same key while a load is in flight wait for
    /// that load and receive its result; calls for different keys never wait
    /// on each other. The remote call itself runs outside the map lock.
    pub async fn get(&self, request: &DecisionRequest) -> bool {
        let start = Instant::now();

        loop {
            let waiter = {
                let mut state = self.state.lock().unwrap();

                let cached = state
                    .entries
                    .get(request)
                    .map(|entry| (entry.allow, entry.expires_at));
                if let Some((allow, expires_at)) = cached {
                    if expires_at > Instant::now() {
                        state.stats.hits += 1;
                        drop(state);
                        self.report(request, allow, DecisionSource::Cache.as_str(), start);
                        return allow;
                    }
                    // write-time TTL passed; treat as absent and reload
                    state.entries.remove(request);
                    state.stats.expired += 1;
                }

                state.stats.misses += 1;

                match state.pending.get_mut(request) {
                    Some(waiters) => {
                        let (sender, receiver) = oneshot::channel();
                        waiters.push(sender);
                        Some(receiver)
                    }
                    None => {
                        // claim the load for this key
                        state.pending.insert(request.clone(), Vec::new());
                        None
                    }
                }
            };

            match waiter {
                Some(receiver) => match receiver.await {
                    Ok((allow, source)) => {
                        self.report(request, allow, source, start);
                        return allow;
                    }
                    // the loader was cancelled before delivering a verdict;
                    // go around and take over the load
                    Err(_) => continue,
                },
                None => return self.load(request, start).await,
            }
        }
    }

    /// Current counters; `entries` reflects the live map size.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        let mut stats = state.stats.clone();
        stats.entries = state.entries.len() as u64;
        stats
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().entries.is_empty()
    }

    /// Perform the single in-flight load for `request` and fan the verdict
    /// out to any callers that queued up behind it.
    async fn load(&self, request: &DecisionRequest, start: Instant) -> bool {
        let mut pending = PendingGuard {
            cache: self,
            request,
            armed: true,
        };

        let result = self.client.evaluate(request).await;
        pending.armed = false;

        let (allow, source) = match &result {
            Ok(allow) => (*allow, DecisionSource::Remote),
            Err(error) => {
                warn!(
                    error = %error,
                    fail_open = self.fail_open,
                    principal = %request.session.principal,
                    operation = %request.operation,
                    resource = %request.resource.name,
                    "policy service unavailable, applying fallback verdict"
                );
                (self.fail_open, DecisionSource::Fallback)
            }
        };

        {
            let mut state = self.state.lock().unwrap();

            match result {
                // failures are never cached, so the next lookup retries
                Ok(_) if self.maximum_size > 0 && !self.ttl.is_zero() => {
                    self.insert_bounded(&mut state, request.clone(), allow);
                }
                Ok(_) => {}
                Err(_) => state.stats.remote_errors += 1,
            }

            if let Some(waiters) = state.pending.remove(request) {
                for waiter in waiters {
                    let _ = waiter.send((allow, source.as_str()));
                }
            }
        }

        self.report(request, allow, source.as_str(), start);
        allow
    }

    /// Insert an entry, evicting the oldest insertions first so the map
    /// never exceeds the configured bound.
    fn insert_bounded(&self, state: &mut CacheState, request: DecisionRequest, allow: bool) {
        while state.entries.len() >= self.maximum_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    state.entries.remove(&key);
                    state.stats.evictions += 1;
                }
                None => break,
            }
        }

        let now = Instant::now();
        state.entries.insert(
            request,
            CacheEntry {
                allow,
                inserted_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    fn report(&self, request: &DecisionRequest, allow: bool, source: &'static str, start: Instant) {
        let elapsed = start.elapsed();
        record_decision(source, allow, elapsed);
        audit_decision(request, allow, source, elapsed);
    }
}

/// Cleans up the pending-load slot if the loading future is dropped before
/// it delivered a verdict. Closing the waiters' channels wakes them so one
/// becomes the new loader.
struct PendingGuard<'a> {
    cache: &'a DecisionCache,
    request: &'a DecisionRequest,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.cache.state.lock() {
            state.pending.remove(self.request);
        }
    }
}
