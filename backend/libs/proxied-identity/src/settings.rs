//! Inbound security settings
//!
//! # Loading Order
//! 1. Built-in defaults
//! 2. Optional settings file
//! 3. Environment variables prefixed `NOVA_SECURITY_` (highest priority)
//!
//! List values in the environment are comma separated, e.g.
//! `NOVA_SECURITY_REQUIRED_ROLES=AuthorizedUser,AuthorizedServer`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError};

use crate::chain::{ChainFactory, DEFAULT_REQUIRED_ROLES};
use crate::dn::SubjectIssuerDnPair;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SecuritySettings {
    /// Honor `X-SSL-clientcert-subject`/`-issuer` from a trusted terminating proxy
    pub use_trusted_subject_headers: bool,

    pub proxied_entities_required: bool,

    pub issuers_required: bool,

    /// Reject requests that present neither a certificate nor trusted headers
    pub require_ssl: bool,

    #[validate(length(min = 1))]
    pub required_roles: Vec<String>,

    pub manager_roles: Vec<String>,

    pub enforce_allowed_callers: bool,

    /// `subject<issuer>` entries
    #[validate(custom(function = "validate_allowed_callers"))]
    pub allowed_callers: Vec<String>,

    pub denied_access_role: Option<String>,

    /// OUs that mark a DN as a non-person entity
    pub npe_ou_list: Vec<String>,
}

fn default_required_roles() -> Vec<String> {
    DEFAULT_REQUIRED_ROLES.iter().map(|r| r.to_string()).collect()
}

fn validate_allowed_callers(allowed: &Vec<String>) -> Result<(), ValidationError> {
    for entry in allowed {
        if entry.parse::<SubjectIssuerDnPair>().is_err() {
            return Err(ValidationError::new("allowed_caller_format"));
        }
    }
    Ok(())
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            use_trusted_subject_headers: false,
            proxied_entities_required: false,
            issuers_required: false,
            require_ssl: false,
            required_roles: default_required_roles(),
            manager_roles: Vec::new(),
            enforce_allowed_callers: true,
            allowed_callers: Vec::new(),
            denied_access_role: None,
            npe_ou_list: Vec::new(),
        }
    }
}

impl SecuritySettings {
    /// Load and validate settings
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("NOVA_SECURITY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("required_roles")
                .with_list_parse_key("manager_roles")
                .with_list_parse_key("allowed_callers")
                .with_list_parse_key("npe_ou_list"),
        );

        let settings: SecuritySettings = builder
            .build()
            .context("Failed to load security settings")?
            .try_deserialize()
            .context("Failed to deserialize security settings")?;

        settings
            .validate()
            .context("Invalid security settings")?;
        Ok(settings)
    }

    pub fn chain_factory(&self) -> ChainFactory {
        ChainFactory::new(self.required_roles.iter().cloned())
    }
}
