//! One client per configured remote authorization service

use anyhow::{bail, Result as AnyResult};
use futures::future::join_all;
use proxied_identity::IdentityChain;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::FederatedAuthorizationClient;
use crate::error::Result;
use crate::model::AuthorizationSet;
use crate::settings::RegistrySettings;

/// Clients keyed by service name, built once at startup
#[derive(Debug, Default, Clone)]
pub struct FederatedAuthorizationRegistry {
    clients: BTreeMap<String, Arc<FederatedAuthorizationClient>>,
}

impl FederatedAuthorizationRegistry {
    pub fn from_settings(settings: &RegistrySettings) -> AnyResult<Self> {
        Self::with_http_client(settings, reqwest::Client::new())
    }

    /// Build every registered service, sharing one HTTP connection pool
    pub fn with_http_client(settings: &RegistrySettings, http: reqwest::Client) -> AnyResult<Self> {
        for name in &settings.registered_services {
            if !settings.services.contains_key(name) {
                bail!("Registered federated service '{}' has no configuration", name);
            }
        }

        let mut clients = BTreeMap::new();
        for (name, service) in &settings.services {
            if !settings.is_registered(name) {
                debug!(service = %name, "federated service configured but not registered");
                continue;
            }
            let client = FederatedAuthorizationClient::with_http_client(name.clone(), service, http.clone())?;
            info!(
                service = %name,
                uri = %client.base_uri(),
                "registered federated authorization service"
            );
            clients.insert(name.clone(), Arc::new(client));
        }

        Ok(Self { clients })
    }

    pub fn get(&self, name: &str) -> Option<Arc<FederatedAuthorizationClient>> {
        self.clients.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Query every registered service concurrently; one failure does not hide the others
    pub async fn list_effective_authorizations_all(
        &self,
        chain: &IdentityChain,
        include_remote: bool,
    ) -> BTreeMap<String, Result<AuthorizationSet>> {
        let calls = self.clients.iter().map(|(name, client)| async move {
            let result = client.list_effective_authorizations(chain, include_remote).await;
            (name.clone(), result)
        });
        join_all(calls).await.into_iter().collect()
    }
}
