//! Integration tests for token refresh coordination across service clients

mod common;

use common::{
    CountingNavigator, config_for, harness, harness_with, logged_in, mount_refresh_failure,
    mount_refresh_success,
};
use fincrm_http::client::{
    ClientError, CookiePolicy, MemoryPersistence, RefreshCookie, RefreshState, ServiceClients,
    TokenPersistence,
};
use fincrm_http::{ApiRequest, Service};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Protected endpoint that only accepts the refreshed access token
async fn mount_protected(server: &MockServer, verb: &str, route: &str) {
    Mock::given(method(verb))
        .and(path(route))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"route": route})))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(server)
        .await;
}

fn bearer(request: &Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

async fn requests_to(server: &MockServer, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == route)
        .collect()
}

#[tokio::test]
async fn test_concurrent_401s_trigger_one_refresh() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::from_millis(200), 1).await;
    for route in [
        "/api/v1/wallets",
        "/api/v1/ledger/entries",
        "/api/v1/transactions",
        "/api/v1/analytics/summary",
    ] {
        mount_protected(&server, "GET", route).await;
    }

    let harness = logged_in(&server);
    let clients = &harness.clients;

    let (wallets, ledger, transactions, analytics) = tokio::join!(
        clients.wallet().get::<Value>("/api/v1/wallets"),
        clients.ledger().get::<Value>("/api/v1/ledger/entries"),
        clients.transaction().get::<Value>("/api/v1/transactions"),
        clients.analytics().get::<Value>("/api/v1/analytics/summary"),
    );

    assert_eq!(wallets.unwrap()["route"], "/api/v1/wallets");
    assert_eq!(ledger.unwrap()["route"], "/api/v1/ledger/entries");
    assert_eq!(transactions.unwrap()["route"], "/api/v1/transactions");
    assert_eq!(analytics.unwrap()["route"], "/api/v1/analytics/summary");

    assert_eq!(requests_to(&server, "/api/v1/refresh").await.len(), 1);
    assert_eq!(clients.coordinator().refresh_calls(), 1);
    assert_eq!(clients.coordinator().state().await, RefreshState::Idle);
    assert_eq!(clients.coordinator().pending().await, 0);
    assert_eq!(clients.tokens().access_token().as_deref(), Some("T2"));
    assert_eq!(clients.tokens().refresh_token().as_deref(), Some("R2"));
    assert_eq!(harness.navigator.redirects(), 0);
    server.verify().await;
}

#[tokio::test]
async fn test_two_clients_retry_with_new_token() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::from_millis(100), 1).await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;
    mount_protected(&server, "GET", "/api/v1/ledger/balances").await;

    let harness = logged_in(&server);
    let clients = &harness.clients;

    let (a, b) = tokio::join!(
        clients.get(Service::Wallet).get::<Value>("/api/v1/wallets"),
        clients.get(Service::Ledger).get::<Value>("/api/v1/ledger/balances"),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());

    for route in ["/api/v1/wallets", "/api/v1/ledger/balances"] {
        let bearers: Vec<_> = requests_to(&server, route)
            .await
            .iter()
            .map(bearer)
            .collect();
        assert_eq!(
            bearers,
            vec![Some("Bearer T1".to_string()), Some("Bearer T2".to_string())]
        );
    }
    server.verify().await;
}

#[tokio::test]
async fn test_failed_refresh_rejects_everyone_and_redirects_once() {
    let server = MockServer::start().await;
    mount_refresh_failure(&server, Duration::from_millis(150), 1).await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;
    mount_protected(&server, "GET", "/api/v1/transactions").await;
    mount_protected(&server, "GET", "/api/v1/analytics/summary").await;

    let harness = logged_in(&server);
    let clients = &harness.clients;

    let (a, b, c) = tokio::join!(
        clients.wallet().get::<Value>("/api/v1/wallets"),
        clients.transaction().get::<Value>("/api/v1/transactions"),
        clients.analytics().get::<Value>("/api/v1/analytics/summary"),
    );

    for result in [a, b, c] {
        let error = result.unwrap_err();
        assert!(matches!(error, ClientError::SessionLost));
        assert!(error.requires_login());
    }
    assert_eq!(harness.navigator.redirects(), 1);
    assert!(clients.tokens().access_token().is_none());
    assert!(!clients.tokens().has_refresh_token());
    assert!(harness.persistence.load().unwrap().is_none());
    assert_eq!(clients.coordinator().state().await, RefreshState::Idle);
    server.verify().await;
}

#[tokio::test]
async fn test_missing_refresh_token_skips_network_refresh() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::ZERO, 0).await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;

    let harness = harness(&server);
    harness.clients.tokens().set_access_token("T1");

    let result = harness.clients.wallet().get::<Value>("/api/v1/wallets").await;

    assert!(matches!(result, Err(ClientError::SessionLost)));
    assert!(harness.clients.tokens().access_token().is_none());
    assert_eq!(harness.navigator.redirects(), 1);
    assert_eq!(harness.clients.coordinator().refresh_calls(), 0);
    server.verify().await;
}

#[tokio::test]
async fn test_second_rejection_is_retry_exhausted() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::ZERO, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ledger/restricted"))
        .respond_with(ResponseTemplate::new(401).set_body_string("no access"))
        .expect(2)
        .mount(&server)
        .await;

    let harness = logged_in(&server);
    let result = harness
        .clients
        .ledger()
        .get::<Value>("/api/v1/ledger/restricted")
        .await;

    match result {
        Err(ClientError::RetryExhausted { path }) => assert_eq!(path, "/api/v1/ledger/restricted"),
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(harness.navigator.redirects(), 0);
    assert_eq!(harness.clients.tokens().access_token().as_deref(), Some("T2"));
    server.verify().await;
}

#[tokio::test]
async fn test_non_auth_errors_pass_through() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::ZERO, 0).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/wallets"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/ledger"))
        .respond_with(ResponseTemplate::new(403).set_body_string("wrong organization"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/transactions/42"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let harness = logged_in(&server);
    let clients = &harness.clients;

    match clients.wallet().get::<Value>("/api/v1/wallets").await {
        Err(ClientError::ServerError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected ServerError, got {other:?}"),
    }
    assert!(matches!(
        clients.ledger().get::<Value>("/api/v1/ledger").await,
        Err(ClientError::Forbidden(_))
    ));
    assert!(matches!(
        clients.transaction().get::<Value>("/api/v1/transactions/42").await,
        Err(ClientError::NotFound(_))
    ));

    assert_eq!(clients.tokens().access_token().as_deref(), Some("T1"));
    assert_eq!(harness.navigator.redirects(), 0);
    server.verify().await;
}

#[tokio::test]
async fn test_restart_without_access_token_recovers_through_refresh() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::ZERO, 1).await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;

    let persistence = Arc::new(MemoryPersistence::with_cookie(RefreshCookie::issue(
        "R1",
        CookiePolicy::default(),
    )));
    let harness = harness_with(&server, persistence);
    assert!(harness.clients.auth_api().restore());

    let result = harness.clients.wallet().get::<Value>("/api/v1/wallets").await;
    assert!(result.is_ok());

    let bearers: Vec<_> = requests_to(&server, "/api/v1/wallets")
        .await
        .iter()
        .map(bearer)
        .collect();
    assert_eq!(bearers, vec![None, Some("Bearer T2".to_string())]);
    server.verify().await;
}

#[tokio::test]
async fn test_replay_resends_body_and_query() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::ZERO, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transactions"))
        .and(header("authorization", "Bearer T2"))
        .and(query_param("idempotency_key", "abc"))
        .and(body_json(json!({"amount": 1250, "currency": "EUR"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "tx_1"})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/transactions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let harness = logged_in(&server);
    let request = ApiRequest::post("/api/v1/transactions")
        .json(&json!({"amount": 1250, "currency": "EUR"}))
        .unwrap()
        .query_pair("idempotency_key", "abc");

    let created: Value = harness.clients.transaction().request(request).await.unwrap();
    assert_eq!(created["id"], "tx_1");
    server.verify().await;
}

#[tokio::test]
async fn test_empty_success_body_decodes_to_unit() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/wallets/w_1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let harness = logged_in(&server);
    let result: Result<(), _> = harness.clients.wallet().delete("/api/v1/wallets/w_1").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_no_redirect_when_already_on_login() {
    let server = MockServer::start().await;
    mount_refresh_failure(&server, Duration::ZERO, 1).await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;

    let navigator = Arc::new(CountingNavigator::on_login_page());
    let persistence = Arc::new(MemoryPersistence::with_cookie(RefreshCookie::issue(
        "R1",
        CookiePolicy::default(),
    )));
    let clients =
        ServiceClients::new(&common::config_for(&server), persistence, navigator.clone()).unwrap();
    clients.tokens().set_access_token("T1");

    let result = clients.wallet().get::<Value>("/api/v1/wallets").await;

    assert!(matches!(result, Err(ClientError::SessionLost)));
    assert_eq!(navigator.redirects(), 0);
    assert!(!clients.tokens().has_refresh_token());
    server.verify().await;
}

#[tokio::test]
async fn test_refresh_after_session_recovered_again() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;
    mount_refresh_success(&server, Duration::ZERO, 1).await;

    let harness = logged_in(&server);
    let wallet = harness.clients.wallet();

    wallet.get::<Value>("/api/v1/wallets").await.unwrap();
    wallet.get::<Value>("/api/v1/wallets").await.unwrap();

    let bearers: Vec<_> = requests_to(&server, "/api/v1/wallets")
        .await
        .iter()
        .map(bearer)
        .collect();
    assert_eq!(
        bearers,
        vec![
            Some("Bearer T1".to_string()),
            Some("Bearer T2".to_string()),
            Some("Bearer T2".to_string()),
        ]
    );
    server.verify().await;
}

#[tokio::test]
async fn test_burst_on_one_service_shares_refresh() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::from_millis(100), 1).await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;

    let harness = logged_in(&server);
    let wallet = harness.clients.wallet();

    let results =
        futures::future::join_all((0..8).map(|_| wallet.get::<Value>("/api/v1/wallets"))).await;

    assert!(results.iter().all(Result::is_ok));
    let retried = requests_to(&server, "/api/v1/wallets")
        .await
        .iter()
        .filter(|request| bearer(request).as_deref() == Some("Bearer T2"))
        .count();
    assert_eq!(retried, 8);
    server.verify().await;
}

#[tokio::test]
async fn test_login_like_paths_on_other_services_still_refresh() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::ZERO, 1).await;
    mount_protected(&server, "GET", "/api/v1/login").await;
    mount_protected(&server, "GET", "/wallets/api/v1/login").await;

    let harness = logged_in(&server);
    let wallet = harness.clients.wallet();

    let exact = wallet.get::<Value>("/api/v1/login").await.unwrap();
    let nested = wallet.get::<Value>("/wallets/api/v1/login").await.unwrap();

    assert_eq!(exact["route"], "/api/v1/login");
    assert_eq!(nested["route"], "/wallets/api/v1/login");
    assert_eq!(harness.navigator.redirects(), 0);
    assert_eq!(harness.clients.coordinator().refresh_calls(), 1);
    server.verify().await;
}

#[tokio::test]
async fn test_oversized_ttl_does_not_wedge_refresh() {
    let server = MockServer::start().await;
    mount_refresh_success(&server, Duration::from_millis(50), 1).await;
    mount_protected(&server, "GET", "/api/v1/wallets").await;
    mount_protected(&server, "GET", "/api/v1/ledger/entries").await;

    let mut config = config_for(&server);
    config.session.refresh_token_ttl_days = 5_000_000;
    assert!(config.validate().is_err());

    // Built without validation, the session still has to work.
    let persistence = Arc::new(MemoryPersistence::with_cookie(RefreshCookie::issue(
        "R1",
        CookiePolicy::default(),
    )));
    let clients = ServiceClients::new(
        &config,
        persistence,
        Arc::new(CountingNavigator::default()),
    )
    .unwrap();
    clients.tokens().set_access_token("T1");

    let (wallets, ledger) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            clients.wallet().get::<Value>("/api/v1/wallets"),
            clients.ledger().get::<Value>("/api/v1/ledger/entries"),
        )
    })
    .await
    .expect("refresh settled");

    assert!(wallets.is_ok());
    assert!(ledger.is_ok());
    assert_eq!(clients.coordinator().state().await, RefreshState::Idle);
    assert_eq!(clients.tokens().refresh_token().as_deref(), Some("R2"));
    server.verify().await;
}
