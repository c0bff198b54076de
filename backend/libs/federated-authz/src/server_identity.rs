//! This service's own identity, for calls it makes as itself
//!
//! The token is fetched from the authorization service over this service's
//! TLS client identity, so the `reqwest::Client` handed in must carry it.

use anyhow::{Context, Result as AnyResult};
use jwt_security::TokenChainDecoder;
use proxied_identity::{AuthError, IdentityChain};
use reqwest::header::ACCEPT;
use resilience::{with_timeout_result, TimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::settings::ServerIdentitySettings;

#[derive(Error, Debug)]
pub enum ServerIdentityError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authorization service returned status {0}")]
    Status(u16),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Token(#[from] AuthError),
}

#[derive(Default)]
struct Cached {
    chain: Option<IdentityChain>,
    fetched_at: Option<Instant>,
}

/// Shared, periodically refreshed server identity
pub struct ServerIdentitySupplier {
    http: reqwest::Client,
    authorization_uri: Url,
    timeout: Duration,
    validity: Duration,
    decoder: TokenChainDecoder,
    state: Mutex<Cached>,
}

impl ServerIdentitySupplier {
    pub fn new(
        settings: &ServerIdentitySettings,
        http: reqwest::Client,
        decoder: TokenChainDecoder,
    ) -> AnyResult<Self> {
        let authorization_uri = Url::parse(&settings.authorization_uri)
            .with_context(|| format!("Invalid authorization URI: {}", settings.authorization_uri))?;

        Ok(Self {
            http,
            authorization_uri,
            timeout: settings.timeout(),
            validity: settings.validity(),
            decoder,
            state: Mutex::new(Cached::default()),
        })
    }

    /// Current identity, refreshed when older than the validity window.
    ///
    /// A failed refresh is logged and the previous value, possibly none, is returned.
    /// Concurrent callers wait on the same lock, so at most one refresh is in flight.
    pub async fn get(&self) -> Option<IdentityChain> {
        let mut state = self.state.lock().await;

        let fresh = state
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.validity);
        if fresh {
            return state.chain.clone();
        }

        match self.fetch().await {
            Ok(chain) => {
                info!(user = %chain.username(), "server identity refreshed");
                state.chain = Some(chain);
                state.fetched_at = Some(Instant::now());
            }
            Err(e) => {
                warn!(
                    error = %e,
                    stale = state.chain.is_some(),
                    "unable to refresh server identity"
                );
            }
        }
        state.chain.clone()
    }

    async fn fetch(&self) -> Result<IdentityChain, ServerIdentityError> {
        let request = async {
            let response = self
                .http
                .get(self.authorization_uri.clone())
                .header(ACCEPT, "text/plain")
                .send()
                .await
                .map_err(|e| ServerIdentityError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ServerIdentityError::Status(status.as_u16()));
            }
            response
                .text()
                .await
                .map_err(|e| ServerIdentityError::Transport(e.to_string()))
        };

        let token = with_timeout_result(self.timeout, request)
            .await
            .map_err(|e| match e {
                TimeoutError::Elapsed(duration) => ServerIdentityError::Timeout(duration),
                TimeoutError::OperationFailed(inner) => inner,
            })?;

        Ok(self.decoder.decode(token.trim())?)
    }
}
