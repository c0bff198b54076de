//! Proxied entity authentication middleware
//!
//! Per request:
//! 1. Read the peer certificate (connection data or request extensions)
//! 2. Run pre-authentication gates (allowed callers)
//! 3. Build the [`IdentityChain`], from a bearer token when a decoder is
//!    configured and one is presented, otherwise from the certificate or trusted
//!    headers plus `X-ProxiedEntitiesChain`, enriched through the directory
//! 4. Run post-authentication gates (denied role)
//! 5. Store the chain for the [`AuthenticatedChain`] extractor
//!
//! A failure at any step rejects the request; a token failure never falls back
//! to header credentials.
//!
//! ## Example
//! ```rust,no_run
//! use actix_middleware::{AuthenticatedChain, ProxiedEntityAuth};
//! use actix_web::{web, App, HttpResponse};
//! use proxied_identity::{InMemoryDirectory, SecuritySettings};
//! use std::sync::Arc;
//!
//! async fn whoami(chain: AuthenticatedChain) -> HttpResponse {
//!     HttpResponse::Ok().body(chain.username())
//! }
//!
//! let settings = SecuritySettings::default();
//! let auth = ProxiedEntityAuth::from_settings(&settings, Arc::new(InMemoryDirectory::new()), None)
//!     .expect("valid settings");
//! let app = App::new().wrap(auth).route("/whoami", web::get().to(whoami));
//! ```

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use jwt_security::TokenChainDecoder;
use proxied_identity::{
    AuthResult, ChainFactory, CredentialExtractor, ExtractorConfig, GateChain, GateStage,
    IdentityChain, IdentityDirectory, InboundCredentials, PeerCertificate, RequestContext,
    SecuritySettings, SubjectIssuerDnPair, ENTITIES_HEADER, ISSUERS_HEADER, ISSUER_DN_HEADER,
    SUBJECT_DN_HEADER,
};
use std::future::{ready, Ready};
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

use crate::error::AuthRejection;

/// The authenticated chain of the current request
#[derive(Debug, Clone)]
pub struct AuthenticatedChain {
    chain: IdentityChain,
    manager: bool,
}

impl AuthenticatedChain {
    /// Whether the primary holds one of the configured manager roles
    pub fn is_manager(&self) -> bool {
        self.manager
    }

    pub fn into_inner(self) -> IdentityChain {
        self.chain
    }
}

impl Deref for AuthenticatedChain {
    type Target = IdentityChain;

    fn deref(&self) -> &Self::Target {
        &self.chain
    }
}

impl FromRequest for AuthenticatedChain {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedChain>() {
            Some(chain) => ready(Ok(chain.clone())),
            None => ready(Err(actix_web::error::ErrorUnauthorized(
                "Request is not authenticated",
            ))),
        }
    }
}

struct AuthState {
    extractor: CredentialExtractor,
    directory: Arc<dyn IdentityDirectory>,
    factory: ChainFactory,
    gates: GateChain,
    decoder: Option<TokenChainDecoder>,
    manager_roles: Vec<String>,
}

/// Proxied entity authentication middleware
#[derive(Clone)]
pub struct ProxiedEntityAuth {
    state: Arc<AuthState>,
}

impl ProxiedEntityAuth {
    pub fn new(
        extractor: CredentialExtractor,
        directory: Arc<dyn IdentityDirectory>,
        factory: ChainFactory,
        gates: GateChain,
        decoder: Option<TokenChainDecoder>,
    ) -> Self {
        Self {
            state: Arc::new(AuthState {
                extractor,
                directory,
                factory,
                gates,
                decoder,
                manager_roles: Vec::new(),
            }),
        }
    }

    /// Extractor policy, required and manager roles, and gates taken from `settings`
    pub fn from_settings(
        settings: &SecuritySettings,
        directory: Arc<dyn IdentityDirectory>,
        decoder: Option<TokenChainDecoder>,
    ) -> AuthResult<Self> {
        Ok(Self {
            state: Arc::new(AuthState {
                extractor: CredentialExtractor::new(ExtractorConfig::from(settings)),
                directory,
                factory: settings.chain_factory(),
                gates: GateChain::from_settings(settings)?,
                decoder,
                manager_roles: settings.manager_roles.clone(),
            }),
        })
    }
}

impl<S, B> Transform<S, ServiceRequest> for ProxiedEntityAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ProxiedEntityAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProxiedEntityAuthService {
            service: Rc::new(service),
            state: self.state.clone(),
        }))
    }
}

pub struct ProxiedEntityAuthService<S> {
    service: Rc<S>,
    state: Arc<AuthState>,
}

impl<S, B> Service<ServiceRequest> for ProxiedEntityAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let state = self.state.clone();

        Box::pin(async move {
            match state.authenticate(&req).await {
                Ok(Some(chain)) => {
                    debug!(user = %chain.username(), path = %req.path(), "request authenticated");
                    let manager = chain.is_manager(&state.manager_roles);
                    req.extensions_mut().insert(AuthenticatedChain { chain, manager });
                }
                Ok(None) => debug!(path = %req.path(), "no credentials presented"),
                Err(e) => return Err(AuthRejection(e).into()),
            }

            service.call(req).await
        })
    }
}

fn header(req: &ServiceRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    header(req, AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer ").map(|token| token.trim().to_string()))
}

fn peer_certificate(req: &ServiceRequest) -> AuthResult<Option<SubjectIssuerDnPair>> {
    let certificate = req
        .conn_data::<PeerCertificate>()
        .cloned()
        .or_else(|| req.extensions().get::<PeerCertificate>().cloned());
    certificate.map(|cert| cert.dn_pair()).transpose()
}

impl AuthState {
    async fn authenticate(&self, req: &ServiceRequest) -> AuthResult<Option<IdentityChain>> {
        let certificate = peer_certificate(req)?;
        self.gates.run(
            GateStage::PreAuthentication,
            &RequestContext {
                certificate: certificate.as_ref(),
                chain: None,
            },
        )?;

        let chain = match (&self.decoder, bearer_token(req)) {
            (Some(decoder), Some(token)) => Some(decoder.decode(&token)?),
            _ => self.chain_from_credentials(req, certificate.clone()).await?,
        };
        let Some(chain) = chain else {
            return Ok(None);
        };

        self.gates.run(
            GateStage::PostAuthentication,
            &RequestContext {
                certificate: certificate.as_ref(),
                chain: Some(&chain),
            },
        )?;
        Ok(Some(chain))
    }

    async fn chain_from_credentials(
        &self,
        req: &ServiceRequest,
        certificate: Option<SubjectIssuerDnPair>,
    ) -> AuthResult<Option<IdentityChain>> {
        let inbound = InboundCredentials {
            client_certificate: certificate,
            trusted_subject: header(req, SUBJECT_DN_HEADER),
            trusted_issuer: header(req, ISSUER_DN_HEADER),
            proxied_entities: header(req, ENTITIES_HEADER),
            proxied_issuers: header(req, ISSUERS_HEADER),
        };

        let Some(extracted) = self.extractor.extract(&inbound)? else {
            return Ok(None);
        };
        let identities = self.directory.lookup(&extracted.chain_pairs()).await?;
        self.factory.create(identities, None).map(Some)
    }
}
