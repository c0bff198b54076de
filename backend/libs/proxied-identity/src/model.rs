//! A single principal in a delegation chain

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::dn::{short_name, SubjectIssuerDnPair};

/// Whether a principal is a person or a non-person entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityType {
    User,
    Server,
}

/// Immutable principal: DN pair, type, roles, authorization labels and creation time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    dn: SubjectIssuerDnPair,
    user_type: IdentityType,
    #[serde(default)]
    roles: BTreeSet<String>,
    #[serde(default)]
    auths: BTreeSet<String>,
    /// Epoch millis
    creation_time: i64,
}

impl Identity {
    pub fn new<R, A>(
        dn: SubjectIssuerDnPair,
        user_type: IdentityType,
        roles: R,
        auths: A,
        creation_time: i64,
    ) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            dn,
            user_type,
            roles: roles.into_iter().map(Into::into).collect(),
            auths: auths.into_iter().map(Into::into).collect(),
            creation_time,
        }
    }

    pub fn dn(&self) -> &SubjectIssuerDnPair {
        &self.dn
    }

    pub fn user_type(&self) -> IdentityType {
        self.user_type
    }

    pub fn is_user(&self) -> bool {
        self.user_type == IdentityType::User
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn auths(&self) -> &BTreeSet<String> {
        &self.auths
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    /// Short display name derived from the subject CN
    pub fn name(&self) -> String {
        short_name(self.dn.subject_dn())
    }

    /// Copy of this identity carrying a different set of authorization labels
    pub fn with_auths<A>(&self, auths: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            auths: auths.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }
}
