//! Integration tests for the federated authorization client against a mock authority

use federated_authz::{
    FederatedAuthorizationClient, FederatedAuthorizationRegistry, FederationFailure,
    FederationSettings, Operation, OperationSettings, RegistrySettings,
};
use proxied_identity::{
    ChainFactory, Identity, IdentityChain, IdentityType, SubjectIssuerDnPair, ENTITIES_HEADER,
    ISSUERS_HEADER,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUER: &str = "cn=nova ca";
const LIST_PATH: &str = "/authorization/v2/listEffectiveAuthorizations";
const FLUSH_PATH: &str = "/authorization/v2/flushCachedCredentials";

fn chain() -> IdentityChain {
    let alice = Identity::new(
        SubjectIssuerDnPair::new("cn=alice", ISSUER),
        IdentityType::User,
        ["AuthorizedUser", "Analyst"],
        ["A"],
        1_000,
    );
    let gateway = Identity::new(
        SubjectIssuerDnPair::new("cn=server1", ISSUER),
        IdentityType::Server,
        ["AuthorizedServer"],
        Vec::<String>::new(),
        2_000,
    );
    ChainFactory::default().create(vec![alice, gateway], None).unwrap()
}

fn operation(timeout_millis: u64, retries: u32) -> OperationSettings {
    OperationSettings {
        timeout_millis,
        retries,
        retry_delay_millis: 10,
    }
}

fn settings(server_uri: &str, retries: u32) -> FederationSettings {
    FederationSettings {
        federated_authorization_uri: format!("{}/authorization/v2", server_uri),
        list_effective_authorizations: operation(5_000, retries),
        flush_cached_credentials: operation(5_000, retries),
        ..Default::default()
    }
}

fn client(server: &MockServer, retries: u32) -> FederatedAuthorizationClient {
    FederatedAuthorizationClient::new("remote", &settings(&server.uri(), retries)).unwrap()
}

fn authorizations() -> serde_json::Value {
    json!({
        "userAuthorizations": [
            {"dn": {"subjectDn": "cn=alice", "issuerDn": ISSUER}, "auths": ["A", "B"]},
            {"dn": {"subjectDn": "cn=server1", "issuerDn": ISSUER}, "auths": ["B"]}
        ],
        "authMapping": {"Analyst": ["A"]},
        "messages": []
    })
}

fn ok_authorizations() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(authorizations())
}

// ==================== Request Shape ====================

#[tokio::test]
async fn test_list_sends_chain_headers_in_canonical_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("includeRemoteServices", "true"))
        .and(header(ENTITIES_HEADER, "<cn=alice><cn=server1>"))
        .and(header(ISSUERS_HEADER, "<cn=nova ca><cn=nova ca>"))
        .and(header("Accept", "application/json"))
        .respond_with(ok_authorizations())
        .expect(1)
        .mount(&server)
        .await;

    let set = client(&server, 0)
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap();

    assert_eq!(set.user_authorizations.len(), 2);
    assert_eq!(set.effective_auths(), BTreeSet::from(["B".to_string()]));
}

#[tokio::test]
async fn test_include_remote_flag_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("includeRemoteServices", "false"))
        .respond_with(ok_authorizations())
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, 0)
        .list_effective_authorizations(&chain(), false)
        .await;

    assert!(result.is_ok());
}

// ==================== Retry Policy ====================

#[tokio::test]
async fn test_two_503_then_200_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ok_authorizations())
        .expect(1)
        .mount(&server)
        .await;

    let set = client(&server, 2)
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap();

    assert_eq!(set.user_authorizations.len(), 2);
}

#[tokio::test]
async fn test_503_until_budget_exhausted_is_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, 2)
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap_err();

    assert_eq!(err.principal, "cn=alice");
    assert_eq!(err.operation, Operation::ListEffectiveAuthorizations);
    assert_eq!(
        err.cause,
        FederationFailure::ServiceUnavailable {
            attempts: 3,
            last_status: Some(503)
        }
    );
}

#[tokio::test]
async fn test_404_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 5)
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap_err();

    assert_eq!(err.cause, FederationFailure::ClientError { status: 404 });
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_connection_refused_is_retried() {
    // Bind then release a port so nothing is listening on it
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let client = FederatedAuthorizationClient::new("remote", &settings(&uri, 1)).unwrap();

    let err = client
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap_err();

    assert_eq!(
        err.cause,
        FederationFailure::ServiceUnavailable {
            attempts: 2,
            last_status: None
        }
    );
}

#[tokio::test]
async fn test_deadline_exceeded_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ok_authorizations().set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let mut settings = settings(&server.uri(), 3);
    settings.list_effective_authorizations = operation(100, 3);
    let client = FederatedAuthorizationClient::new("remote", &settings).unwrap();

    let err = client
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap_err();

    assert_eq!(err.cause, FederationFailure::Timeout(Duration::from_millis(100)));
}

#[tokio::test]
async fn test_response_over_buffer_limit_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ok_authorizations())
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = settings(&server.uri(), 3);
    settings.max_bytes_to_buffer = 16;
    let client = FederatedAuthorizationClient::new("remote", &settings).unwrap();

    let err = client
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap_err();

    assert_eq!(err.cause, FederationFailure::ResponseTooLarge { limit: 16 });
}

#[tokio::test]
async fn test_malformed_body_is_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .list_effective_authorizations(&chain(), true)
        .await
        .unwrap_err();

    assert!(matches!(err.cause, FederationFailure::Decode(_)));
}

// ==================== Caching ====================

#[tokio::test]
async fn test_identical_calls_hit_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ok_authorizations())
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0);
    let first = client.list_effective_authorizations(&chain(), true).await.unwrap();
    let second = client.list_effective_authorizations(&chain(), true).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ok_authorizations())
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0);
    assert!(client.list_effective_authorizations(&chain(), true).await.is_err());
    assert!(client.list_effective_authorizations(&chain(), true).await.is_ok());
}

#[tokio::test]
async fn test_flush_returns_ack_and_invalidates_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ok_authorizations())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FLUSH_PATH))
        .and(query_param("includeRemoteServices", "true"))
        .and(header(ENTITIES_HEADER, "<cn=alice><cn=server1>"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Result": "Flushed 1 user",
            "HasResults": true,
            "OperationTimeMS": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0);
    client.list_effective_authorizations(&chain(), true).await.unwrap();

    let ack = client.flush_cached_credentials(&chain(), true).await.unwrap();
    assert_eq!(ack.result.as_deref(), Some("Flushed 1 user"));

    client.list_effective_authorizations(&chain(), true).await.unwrap();
}

#[tokio::test]
async fn test_remote_identity_replaces_member_auths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userAuthorizations": [
                {"dn": {"subjectDn": "cn=alice", "issuerDn": ISSUER}, "auths": ["A", "B"]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 0);
    let local = chain();
    let remote = client.get_remote_identity(&local).await.unwrap();

    assert_eq!(remote.username(), local.username());
    assert_eq!(remote.authorities(), local.authorities());
    let auths: Vec<Vec<&str>> = remote
        .auths_per_member()
        .into_iter()
        .map(|set| set.iter().map(String::as_str).collect())
        .collect();
    assert_eq!(auths, vec![vec!["A", "B"], vec![]]);

    let again = client.get_remote_identity(&local).await.unwrap();
    assert_eq!(again, remote);
}

// ==================== Registry ====================

#[tokio::test]
async fn test_registry_queries_each_service() {
    let east = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ok_authorizations())
        .expect(1)
        .mount(&east)
        .await;
    let west = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&west)
        .await;

    let settings = RegistrySettings {
        services: BTreeMap::from([
            ("east".to_string(), settings(&east.uri(), 0)),
            ("west".to_string(), settings(&west.uri(), 0)),
        ]),
        ..Default::default()
    };
    let registry = FederatedAuthorizationRegistry::from_settings(&settings).unwrap();

    let results = registry.list_effective_authorizations_all(&chain(), true).await;

    assert!(results["east"].is_ok());
    let west_err = results["west"].as_ref().unwrap_err();
    assert_eq!(west_err.cause, FederationFailure::ClientError { status: 401 });
}
