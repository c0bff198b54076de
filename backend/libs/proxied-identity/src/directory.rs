//! Identity enrichment: turning presented DN pairs into full identities

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::dn::{is_server_dn, SubjectIssuerDnPair};
use crate::error::{AuthError, AuthResult};
use crate::model::{Identity, IdentityType};

/// Source of type, roles and auths for presented DNs
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Identities for `pairs`, same order and length, duplicates included
    async fn lookup(&self, pairs: &[SubjectIssuerDnPair]) -> AuthResult<Vec<Identity>>;
}

#[async_trait]
impl<T: IdentityDirectory + ?Sized> IdentityDirectory for Arc<T> {
    async fn lookup(&self, pairs: &[SubjectIssuerDnPair]) -> AuthResult<Vec<Identity>> {
        (**self).lookup(pairs).await
    }
}

/// Static directory held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    entries: Arc<RwLock<HashMap<SubjectIssuerDnPair, Identity>>>,
    npe_ou_list: Vec<String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// OUs whose subjects [`register`](Self::register) classifies as SERVER
    pub fn with_npe_ou_list<I, S>(mut self, ous: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.npe_ou_list = ous.into_iter().map(Into::into).collect();
        self
    }

    /// Store a principal whose type follows from its subject DN
    pub fn register<R, A>(
        &self,
        dn: SubjectIssuerDnPair,
        roles: R,
        auths: A,
        creation_time: i64,
    ) -> Identity
    where
        R: IntoIterator,
        R::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let user_type = if is_server_dn(dn.subject_dn(), &self.npe_ou_list) {
            IdentityType::Server
        } else {
            IdentityType::User
        };
        let identity = Identity::new(dn, user_type, roles, auths, creation_time);
        self.insert(identity.clone());
        identity
    }

    pub fn with_identity(self, identity: Identity) -> Self {
        self.insert(identity);
        self
    }

    pub fn insert(&self, identity: Identity) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(identity.dn().clone(), identity);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn lookup(&self, pairs: &[SubjectIssuerDnPair]) -> AuthResult<Vec<Identity>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuthError::UnknownIdentity("directory unavailable".to_string()))?;

        pairs
            .iter()
            .map(|pair| {
                entries
                    .get(pair)
                    .cloned()
                    .ok_or_else(|| AuthError::UnknownIdentity(pair.to_string()))
            })
            .collect()
    }
}
