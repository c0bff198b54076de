//! Federation settings
//!
//! # Loading Order
//! 1. Built-in defaults
//! 2. Optional settings file
//! 3. Environment variables prefixed `NOVA_FEDERATION_` (highest priority)
//!
//! Nested keys use `__`, e.g.
//! `NOVA_FEDERATION_SERVICES__REMOTE__FEDERATED_AUTHORIZATION_URI=https://remote:8443/authorization/v2`.

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use resilience::{federated_authorization_policy, CallPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Timeout and retry budget for one remote operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OperationSettings {
    /// Bounds the whole operation, retries included
    #[validate(range(min = 1))]
    pub timeout_millis: u64,
    pub retries: u32,
    pub retry_delay_millis: u64,
}

impl Default for OperationSettings {
    fn default() -> Self {
        let policy = federated_authorization_policy();
        Self {
            timeout_millis: policy.timeout.duration.as_millis() as u64,
            retries: policy.retry.max_retries,
            retry_delay_millis: policy.retry.delay.as_millis() as u64,
        }
    }
}

impl OperationSettings {
    pub fn policy(&self) -> CallPolicy {
        CallPolicy::new(
            Duration::from_millis(self.timeout_millis),
            self.retries,
            Duration::from_millis(self.retry_delay_millis),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheSettings {
    pub max_size: u64,
    #[validate(range(min = 1))]
    pub expire_after_access_secs: u64,
    #[validate(range(min = 1))]
    pub expire_after_write_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: 1000,
            expire_after_access_secs: 300,
            expire_after_write_secs: 300,
        }
    }
}

impl CacheSettings {
    pub fn expire_after_access(&self) -> Duration {
        Duration::from_secs(self.expire_after_access_secs)
    }

    pub fn expire_after_write(&self) -> Duration {
        Duration::from_secs(self.expire_after_write_secs)
    }
}

/// One remote authorization service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FederationSettings {
    #[validate(url)]
    pub federated_authorization_uri: String,

    /// -1 is unlimited
    #[validate(range(min = -1))]
    pub max_bytes_to_buffer: i64,

    #[validate(nested)]
    pub list_effective_authorizations: OperationSettings,

    #[validate(nested)]
    pub flush_cached_credentials: OperationSettings,

    #[validate(nested)]
    pub cache: CacheSettings,
}

impl Default for FederationSettings {
    fn default() -> Self {
        Self {
            federated_authorization_uri: "https://authorization:8443/authorization/v2".to_string(),
            max_bytes_to_buffer: -1,
            list_effective_authorizations: OperationSettings::default(),
            flush_cached_credentials: OperationSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl FederationSettings {
    pub fn max_bytes(&self) -> Option<u64> {
        u64::try_from(self.max_bytes_to_buffer).ok()
    }
}

/// Where and how often this service fetches its own identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerIdentitySettings {
    #[validate(url)]
    pub authorization_uri: String,
    #[validate(range(min = 1))]
    pub timeout_millis: u64,
    pub validity_secs: u64,
}

impl Default for ServerIdentitySettings {
    fn default() -> Self {
        Self {
            authorization_uri: "https://authorization:8443/authorization/v1/authorize".to_string(),
            timeout_millis: 30_000,
            validity_secs: 24 * 60 * 60,
        }
    }
}

impl ServerIdentitySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_secs)
    }
}

/// Named remote services and which of them to instantiate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RegistrySettings {
    #[validate(custom(function = "validate_services"))]
    pub services: BTreeMap<String, FederationSettings>,

    /// Empty registers every configured service
    pub registered_services: Vec<String>,

    #[validate(nested)]
    pub server_identity: ServerIdentitySettings,
}

fn validate_services(services: &BTreeMap<String, FederationSettings>) -> Result<(), ValidationError> {
    for settings in services.values() {
        if settings.validate().is_err() {
            return Err(ValidationError::new("invalid_federated_service"));
        }
    }
    Ok(())
}

impl RegistrySettings {
    /// Load and validate settings
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("NOVA_FEDERATION")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("registered_services"),
        );

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: RegistrySettings = builder
            .build()
            .context("Failed to load federation settings")?
            .try_deserialize()
            .context("Failed to deserialize federation settings")?;

        settings
            .validate()
            .context("Invalid federation settings")?;
        Ok(settings)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered_services.is_empty() || self.registered_services.iter().any(|s| s == name)
    }
}
