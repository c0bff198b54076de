//! Local cache of remote authorization responses
//!
//! Entries are keyed by operation, identity chain and the include-remote flag.
//! Concurrent misses for the same key are not coalesced; each caller performs
//! its own remote call and the last write wins.

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use proxied_identity::IdentityChain;
use std::time::Duration;
use tracing::debug;

use crate::model::{AuthorizationSet, Operation};
use crate::settings::CacheSettings;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: Operation,
    pub chain: IdentityChain,
    pub include_remote: bool,
}

impl CacheKey {
    pub fn new(operation: Operation, chain: IdentityChain, include_remote: bool) -> Self {
        Self {
            operation,
            chain,
            include_remote,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedResponse {
    Authorizations(AuthorizationSet),
    RemoteIdentity(IdentityChain),
}

/// Storage for successful remote responses, owned by one client
#[async_trait]
pub trait AuthorizationCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<CachedResponse>;

    async fn insert(&self, key: CacheKey, value: CachedResponse);

    async fn invalidate(&self, key: &CacheKey);

    /// Drop every entry held for `chain`
    async fn invalidate_chain(&self, chain: &IdentityChain) {
        for operation in Operation::ALL {
            for include_remote in [true, false] {
                self.invalidate(&CacheKey::new(operation, chain.clone(), include_remote))
                    .await;
            }
        }
    }
}

/// Size-bounded LRU cache with idle and absolute expiry
#[derive(Clone)]
pub struct MokaAuthorizationCache {
    cache: Cache<CacheKey, CachedResponse>,
}

impl MokaAuthorizationCache {
    pub fn new(max_size: u64, expire_after_access: Duration, expire_after_write: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_size)
            .time_to_idle(expire_after_access)
            .time_to_live(expire_after_write)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        debug!(
            max_size,
            ?expire_after_access,
            ?expire_after_write,
            "Initialized authorization cache"
        );
        Self { cache }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(
            settings.max_size,
            settings.expire_after_access(),
            settings.expire_after_write(),
        )
    }

    /// Approximate; pending maintenance may not be applied yet
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl AuthorizationCache for MokaAuthorizationCache {
    async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.cache.get(key).await
    }

    async fn insert(&self, key: CacheKey, value: CachedResponse) {
        self.cache.insert(key, value).await;
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }
}
