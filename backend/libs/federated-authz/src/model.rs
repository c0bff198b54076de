//! Remote operations and the documents they return

use proxied_identity::SubjectIssuerDnPair;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Operations exposed by a remote authorization service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListEffectiveAuthorizations,
    FlushCachedCredentials,
    /// Local view of `listEffectiveAuthorizations` folded back into a chain
    GetRemoteIdentity,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::ListEffectiveAuthorizations,
        Operation::FlushCachedCredentials,
        Operation::GetRemoteIdentity,
    ];

    /// Path segment relative to the authority's base URI
    pub fn path(&self) -> &'static str {
        match self {
            Self::ListEffectiveAuthorizations | Self::GetRemoteIdentity => {
                "listEffectiveAuthorizations"
            }
            Self::FlushCachedCredentials => "flushCachedCredentials",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetRemoteIdentity => f.write_str("getRemoteIdentity"),
            other => f.write_str(other.path()),
        }
    }
}

/// Authorization labels granted to one member of the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuthorizations {
    pub dn: SubjectIssuerDnPair,
    #[serde(default)]
    pub auths: BTreeSet<String>,
}

/// Effective authorizations for every member of a chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationSet {
    #[serde(default)]
    pub user_authorizations: Vec<UserAuthorizations>,
    /// Role to authorization-label mapping applied by the remote authority
    #[serde(default)]
    pub auth_mapping: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl AuthorizationSet {
    /// Labels for `dn`, or `None` when the authority returned nothing for it
    pub fn auths_for(&self, dn: &SubjectIssuerDnPair) -> Option<&BTreeSet<String>> {
        self.user_authorizations
            .iter()
            .find(|entry| &entry.dn == dn)
            .map(|entry| &entry.auths)
    }

    /// Labels held by every member; what a query on behalf of the chain may see
    pub fn effective_auths(&self) -> BTreeSet<String> {
        let mut members = self.user_authorizations.iter();
        let Some(first) = members.next() else {
            return BTreeSet::new();
        };
        members.fold(first.auths.clone(), |acc, entry| {
            acc.intersection(&entry.auths).cloned().collect()
        })
    }
}

/// Generic acknowledgement document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Acknowledgement {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub has_results: bool,
    #[serde(default, rename = "OperationTimeMS")]
    pub operation_time_ms: u64,
}
