//! Client for a remote authorization service
//!
//! Every operation sends the chain as `X-ProxiedEntitiesChain` and
//! `X-ProxiedIssuersChain` headers in canonical order. Server errors and
//! transport failures are retried with a fixed delay; client errors end the
//! call immediately. The whole call, retries included, runs under one deadline.

use anyhow::{Context, Result as AnyResult};
use proxied_identity::{build_proxied_dn, IdentityChain, ENTITIES_HEADER, ISSUERS_HEADER};
use reqwest::header::ACCEPT;
use resilience::CallPolicy;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{AuthorizationCache, CacheKey, CachedResponse, MokaAuthorizationCache};
use crate::error::{AuthorizationError, FederationFailure, Result};
use crate::model::{Acknowledgement, AuthorizationSet, Operation};
use crate::settings::FederationSettings;

const APPLICATION_JSON: &str = "application/json";

#[derive(Clone)]
pub struct FederatedAuthorizationClient {
    name: String,
    http: reqwest::Client,
    base_uri: Url,
    max_bytes: Option<u64>,
    list_policy: CallPolicy,
    flush_policy: CallPolicy,
    cache: Arc<dyn AuthorizationCache>,
}

impl std::fmt::Debug for FederatedAuthorizationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedAuthorizationClient")
            .field("name", &self.name)
            .field("base_uri", &self.base_uri.as_str())
            .finish()
    }
}

impl FederatedAuthorizationClient {
    /// Client with its own HTTP connection pool and cache
    pub fn new(name: impl Into<String>, settings: &FederationSettings) -> AnyResult<Self> {
        Self::with_http_client(name, settings, reqwest::Client::new())
    }

    /// Share an HTTP client, e.g. one configured with this service's TLS identity
    pub fn with_http_client(
        name: impl Into<String>,
        settings: &FederationSettings,
        http: reqwest::Client,
    ) -> AnyResult<Self> {
        let cache = Arc::new(MokaAuthorizationCache::from_settings(&settings.cache));
        Self::with_parts(name, settings, http, cache)
    }

    pub fn with_parts(
        name: impl Into<String>,
        settings: &FederationSettings,
        http: reqwest::Client,
        cache: Arc<dyn AuthorizationCache>,
    ) -> AnyResult<Self> {
        let mut base_uri = Url::parse(&settings.federated_authorization_uri).with_context(|| {
            format!(
                "Invalid federated authorization URI: {}",
                settings.federated_authorization_uri
            )
        })?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base_uri.path().ends_with('/') {
            let path = format!("{}/", base_uri.path());
            base_uri.set_path(&path);
        }

        Ok(Self {
            name: name.into(),
            http,
            base_uri,
            max_bytes: settings.max_bytes(),
            list_policy: settings.list_effective_authorizations.policy(),
            flush_policy: settings.flush_cached_credentials.policy(),
            cache,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    /// Effective authorizations for every member of `chain`. Cached on success.
    pub async fn list_effective_authorizations(
        &self,
        chain: &IdentityChain,
        include_remote: bool,
    ) -> Result<AuthorizationSet> {
        let key = CacheKey::new(
            Operation::ListEffectiveAuthorizations,
            chain.clone(),
            include_remote,
        );
        if let Some(CachedResponse::Authorizations(set)) = self.cache.get(&key).await {
            debug!(service = %self.name, user = %chain.username(), "authorization cache hit");
            return Ok(set);
        }

        let set: AuthorizationSet = self
            .call(Operation::ListEffectiveAuthorizations, chain, include_remote)
            .await?;
        self.cache
            .insert(key, CachedResponse::Authorizations(set.clone()))
            .await;
        Ok(set)
    }

    /// Ask the remote authority to forget `chain`, then drop local entries for it
    pub async fn flush_cached_credentials(
        &self,
        chain: &IdentityChain,
        include_remote: bool,
    ) -> Result<Acknowledgement> {
        let ack: Acknowledgement = self
            .call(Operation::FlushCachedCredentials, chain, include_remote)
            .await?;
        self.cache.invalidate_chain(chain).await;
        Ok(ack)
    }

    /// `chain` with each member's auths replaced by what the remote authority grants.
    ///
    /// Members the authority did not return get no auths.
    pub async fn get_remote_identity(&self, chain: &IdentityChain) -> Result<IdentityChain> {
        let key = CacheKey::new(Operation::GetRemoteIdentity, chain.clone(), true);
        if let Some(CachedResponse::RemoteIdentity(remote)) = self.cache.get(&key).await {
            return Ok(remote);
        }

        let set = self.list_effective_authorizations(chain, true).await?;
        let remote =
            chain.with_member_auths(|member| set.auths_for(member.dn()).cloned().unwrap_or_default());

        self.cache
            .insert(key, CachedResponse::RemoteIdentity(remote.clone()))
            .await;
        Ok(remote)
    }

    fn policy(&self, operation: Operation) -> &CallPolicy {
        match operation {
            Operation::FlushCachedCredentials => &self.flush_policy,
            Operation::ListEffectiveAuthorizations | Operation::GetRemoteIdentity => {
                &self.list_policy
            }
        }
    }

    fn endpoint(&self, operation: Operation, include_remote: bool) -> Result<Url, FederationFailure> {
        let mut url = self
            .base_uri
            .join(operation.path())
            .map_err(|e| FederationFailure::Transport(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("includeRemoteServices", if include_remote { "true" } else { "false" });
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: Operation,
        chain: &IdentityChain,
        include_remote: bool,
    ) -> Result<T> {
        let principal = chain.primary().dn().subject_dn().to_string();
        info!(
            service = %self.name,
            operation = %operation,
            user = %principal,
            include_remote,
            "calling federated authorization service"
        );

        let entities = build_proxied_dn(chain.subject_dns());
        let issuers = build_proxied_dn(chain.issuer_dns());

        let outcome = match self.endpoint(operation, include_remote) {
            Ok(url) => self
                .policy(operation)
                .execute(
                    || self.attempt(&url, &entities, &issuers),
                    FederationFailure::is_retryable,
                )
                .await
                .map_err(FederationFailure::from),
            Err(failure) => Err(failure),
        };

        outcome.map_err(|cause| {
            warn!(
                service = %self.name,
                operation = %operation,
                user = %principal,
                status = ?cause.status(),
                "federated authorization call failed: {}",
                cause
            );
            AuthorizationError {
                principal,
                operation,
                cause,
            }
        })
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &Url,
        entities: &str,
        issuers: &str,
    ) -> Result<T, FederationFailure> {
        let response = self
            .http
            .get(url.clone())
            .header(ENTITIES_HEADER, entities)
            .header(ISSUERS_HEADER, issuers)
            .header(ACCEPT, APPLICATION_JSON)
            .send()
            .await
            .map_err(|e| FederationFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FederationFailure::ServerError {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FederationFailure::ClientError {
                status: status.as_u16(),
            });
        }

        let body = self.read_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| FederationFailure::Decode(e.to_string()))
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<Vec<u8>, FederationFailure> {
        let Some(limit) = self.max_bytes else {
            return response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|e| FederationFailure::Transport(e.to_string()));
        };

        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FederationFailure::ResponseTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FederationFailure::Transport(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FederationFailure::ResponseTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
