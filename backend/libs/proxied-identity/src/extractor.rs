//! Caller and proxy chain extraction from transport credentials
//!
//! The caller comes from the client certificate when one was presented, else
//! from the trusted subject/issuer headers when those are honored. The proxy
//! chain comes from `X-ProxiedEntitiesChain`, optionally paired with
//! `X-ProxiedIssuersChain`. Any violation fails the whole attempt; there is no
//! fallback to another credential source.

use tracing::{debug, warn};

use crate::dn::{split_proxied_dns, SubjectIssuerDnPair};
use crate::error::{AuthError, AuthResult};
use crate::settings::SecuritySettings;

pub const SUBJECT_DN_HEADER: &str = "X-SSL-clientcert-subject";
pub const ISSUER_DN_HEADER: &str = "X-SSL-clientcert-issuer";
pub const ENTITIES_HEADER: &str = "X-ProxiedEntitiesChain";
pub const ISSUERS_HEADER: &str = "X-ProxiedIssuersChain";

/// Extraction policy
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    /// Honor `X-SSL-clientcert-subject`/`-issuer` when no certificate is present
    pub use_trusted_subject_headers: bool,
    /// Reject requests without `X-ProxiedEntitiesChain`
    pub proxied_entities_required: bool,
    /// Require a parallel `X-ProxiedIssuersChain` of equal length
    pub issuers_required: bool,
    /// Reject requests that present no caller credential at all
    pub caller_required: bool,
}

impl From<&SecuritySettings> for ExtractorConfig {
    fn from(settings: &SecuritySettings) -> Self {
        Self {
            use_trusted_subject_headers: settings.use_trusted_subject_headers,
            proxied_entities_required: settings.proxied_entities_required,
            issuers_required: settings.issuers_required,
            caller_required: settings.require_ssl,
        }
    }
}

/// Credential material already read off an inbound request
#[derive(Debug, Clone, Default)]
pub struct InboundCredentials {
    pub client_certificate: Option<SubjectIssuerDnPair>,
    pub trusted_subject: Option<String>,
    pub trusted_issuer: Option<String>,
    pub proxied_entities: Option<String>,
    pub proxied_issuers: Option<String>,
}

/// Caller plus the proxied entities it claims to act for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCredentials {
    pub caller: SubjectIssuerDnPair,
    pub proxied_entities: Vec<SubjectIssuerDnPair>,
}

impl ExtractedCredentials {
    /// Raw chain order: proxied entities as presented, then the connecting caller
    pub fn chain_pairs(&self) -> Vec<SubjectIssuerDnPair> {
        let mut pairs = self.proxied_entities.clone();
        pairs.push(self.caller.clone());
        pairs
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialExtractor {
    config: ExtractorConfig,
}

impl CredentialExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// The caller's DN pair, if any credential was presented
    pub fn caller(&self, inbound: &InboundCredentials) -> Option<SubjectIssuerDnPair> {
        if let Some(cert) = &inbound.client_certificate {
            debug!(caller = %cert, "caller taken from client certificate");
            return Some(cert.clone());
        }
        if !self.config.use_trusted_subject_headers {
            return None;
        }
        match (&inbound.trusted_subject, &inbound.trusted_issuer) {
            (Some(subject), Some(issuer)) => Some(SubjectIssuerDnPair::new(subject, issuer)),
            _ => None,
        }
    }

    /// Extract the caller and proxy chain.
    ///
    /// `Ok(None)` means no credential was presented and none is required.
    pub fn extract(&self, inbound: &InboundCredentials) -> AuthResult<Option<ExtractedCredentials>> {
        let Some(caller) = self.caller(inbound) else {
            if self.config.caller_required {
                return Err(AuthError::credentials(
                    "No client certificate or trusted subject headers presented",
                ));
            }
            return Ok(None);
        };

        let entities = inbound.proxied_entities.as_deref();
        let issuers = inbound.proxied_issuers.as_deref();

        if self.config.proxied_entities_required && entities.is_none() {
            warn!(caller = %caller, "rejecting request without proxied entities");
            return Err(AuthError::credentials(format!(
                "{} header is missing",
                ENTITIES_HEADER
            )));
        }

        let proxied_entities = match entities {
            Some(entities) => self.pair_entities(&caller, entities, issuers)?,
            None => Vec::new(),
        };

        Ok(Some(ExtractedCredentials {
            caller,
            proxied_entities,
        }))
    }

    fn pair_entities(
        &self,
        caller: &SubjectIssuerDnPair,
        entities: &str,
        issuers: Option<&str>,
    ) -> AuthResult<Vec<SubjectIssuerDnPair>> {
        let subjects = split_proxied_dns(entities, true)?;

        if !self.config.issuers_required {
            return Ok(subjects
                .iter()
                .map(|subject| SubjectIssuerDnPair::new(subject, caller.issuer_dn()))
                .collect());
        }

        let Some(issuers) = issuers else {
            warn!(caller = %caller, "proxied entities supplied without issuers");
            return Err(AuthError::credentials(format!(
                "{} header was supplied, but {} header is missing",
                ENTITIES_HEADER, ISSUERS_HEADER
            )));
        };

        let issuer_dns = split_proxied_dns(issuers, true)?;
        if issuer_dns.len() != subjects.len() {
            warn!(
                caller = %caller,
                entities = %entities,
                issuers = %issuers,
                "failing authorization since issuers and entities don't match up"
            );
            return Err(AuthError::credentials("Invalid proxied entities chain"));
        }

        Ok(subjects
            .iter()
            .zip(issuer_dns.iter())
            .map(|(subject, issuer)| SubjectIssuerDnPair::new(subject, issuer))
            .collect())
    }
}
