//! End-to-end: headers -> extractor -> directory -> chain -> gates

use proxied_identity::{
    ChainFactory, CredentialExtractor, ExtractorConfig, GateChain, GateStage, Identity,
    IdentityDirectory, IdentityType, InMemoryDirectory, InboundCredentials, RequestContext,
    SecuritySettings, SubjectIssuerDnPair,
};

const CA: &str = "cn=nova ca,o=nova";

fn identity(subject: &str, user_type: IdentityType, roles: &[&str]) -> Identity {
    Identity::new(
        SubjectIssuerDnPair::new(subject, CA),
        user_type,
        roles.iter().copied(),
        ["PUBLIC"],
        1_700_000_000_000,
    )
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_identity(identity("cn=alice,o=nova", IdentityType::User, &["AuthorizedUser", "Analyst"]))
        .with_identity(identity("cn=web,o=nova", IdentityType::Server, &["AuthorizedServer"]))
        .with_identity(identity("cn=query,o=nova", IdentityType::Server, &["AuthorizedQueryServer"]))
        .with_identity(identity("cn=mallory,o=nova", IdentityType::User, &["Analyst", "Blocked"]))
}

fn inbound(entities: &str, issuers: &str) -> InboundCredentials {
    InboundCredentials {
        trusted_subject: Some("cn=query,o=nova".to_string()),
        trusted_issuer: Some(CA.to_string()),
        proxied_entities: Some(entities.to_string()),
        proxied_issuers: Some(issuers.to_string()),
        ..Default::default()
    }
}

fn extractor() -> CredentialExtractor {
    CredentialExtractor::new(ExtractorConfig {
        use_trusted_subject_headers: true,
        proxied_entities_required: true,
        issuers_required: true,
        caller_required: true,
    })
}

#[tokio::test]
async fn test_vetted_chain_through_two_proxies() {
    let extracted = extractor()
        .extract(&inbound(
            "<cn=alice,o=nova><cn=web,o=nova>",
            "<cn=nova ca,o=nova><cn=nova ca,o=nova>",
        ))
        .unwrap()
        .unwrap();

    let members = directory().lookup(&extracted.chain_pairs()).await.unwrap();
    let chain = ChainFactory::default().create(members, None).unwrap();

    assert_eq!(chain.username(), "alice -> web -> query");
    assert_eq!(chain.primary().dn().subject_dn(), "cn=alice,o=nova");
    assert_eq!(chain.proxy_servers(), Some(vec!["cn=web,o=nova", "cn=query,o=nova"]));
    assert_eq!(chain.authorities().iter().collect::<Vec<_>>(), vec!["Analyst"]);
}

#[tokio::test]
async fn test_unvetted_hop_keeps_gatekeeper_roles_visible() {
    let extracted = extractor()
        .extract(&inbound("<cn=mallory,o=nova>", "<cn=nova ca,o=nova>"))
        .unwrap()
        .unwrap();

    let members = directory().lookup(&extracted.chain_pairs()).await.unwrap();
    let chain = ChainFactory::default().create(members, None).unwrap();

    assert!(chain.has_authority("Blocked"));
    assert!(chain.has_authority("Analyst"));
}

#[tokio::test]
async fn test_denied_role_rejects_valid_credentials() {
    let settings = SecuritySettings {
        denied_access_role: Some("Blocked".to_string()),
        ..Default::default()
    };
    let gates = GateChain::from_settings(&settings).unwrap();

    let extracted = extractor()
        .extract(&inbound("<cn=mallory,o=nova>", "<cn=nova ca,o=nova>"))
        .unwrap()
        .unwrap();
    let members = directory().lookup(&extracted.chain_pairs()).await.unwrap();
    let chain = settings.chain_factory().create(members, None).unwrap();

    let ctx = RequestContext {
        certificate: None,
        chain: Some(&chain),
    };
    assert!(gates.run(GateStage::PreAuthentication, &ctx).is_ok());
    let err = gates.run(GateStage::PostAuthentication, &ctx).unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_settings_classify_servers_and_managers() {
    let settings = SecuritySettings {
        npe_ou_list: vec!["Gateways".to_string()],
        manager_roles: vec!["Administrator".to_string()],
        ..Default::default()
    };
    let directory = InMemoryDirectory::new().with_npe_ou_list(settings.npe_ou_list.iter().cloned());
    directory.register(
        SubjectIssuerDnPair::new("cn=carol,ou=people,o=nova", CA),
        ["AuthorizedUser", "Administrator"],
        ["PUBLIC"],
        0,
    );
    directory.register(
        SubjectIssuerDnPair::new("cn=query,ou=gateways,o=nova", CA),
        ["AuthorizedQueryServer"],
        ["PUBLIC"],
        0,
    );

    let extracted = CredentialExtractor::new(ExtractorConfig {
        use_trusted_subject_headers: true,
        ..Default::default()
    })
    .extract(&InboundCredentials {
        trusted_subject: Some("cn=query,ou=gateways,o=nova".to_string()),
        trusted_issuer: Some(CA.to_string()),
        proxied_entities: Some("<cn=carol,ou=people,o=nova>".to_string()),
        ..Default::default()
    })
    .unwrap()
    .unwrap();
    let members = directory.lookup(&extracted.chain_pairs()).await.unwrap();
    let chain = settings.chain_factory().create(members, None).unwrap();

    assert_eq!(chain.username(), "carol -> query");
    assert_eq!(chain.proxy_servers(), Some(vec!["cn=query,ou=gateways,o=nova"]));
    assert!(chain.is_manager(&settings.manager_roles));
}

#[test]
fn test_entity_issuer_count_mismatch() {
    let result = extractor().extract(&inbound("<cn=a>", "<cn=ca1><cn=ca2>"));
    assert!(result.is_err());

    let ok = extractor()
        .extract(&inbound("<cn=a><cn=b>", "<cn=ca1><cn=ca2>"))
        .unwrap()
        .unwrap();
    assert_eq!(ok.proxied_entities.len(), 2);
}
