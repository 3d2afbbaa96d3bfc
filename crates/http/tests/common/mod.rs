//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use fincrm_core::{ClientConfig, ServiceEndpoints};
use fincrm_http::client::{
    CookiePolicy, MemoryPersistence, NavigationPort, RefreshCookie, ServiceClients,
    TokenPersistence,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Navigator that records how often the user was sent to the login route
#[derive(Default)]
pub struct CountingNavigator {
    redirects: AtomicUsize,
    on_login: AtomicBool,
}

impl CountingNavigator {
    pub fn on_login_page() -> Self {
        Self {
            redirects: AtomicUsize::new(0),
            on_login: AtomicBool::new(true),
        }
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl NavigationPort for CountingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        self.on_login.store(true, Ordering::SeqCst);
    }

    fn current_path_is_login(&self) -> bool {
        self.on_login.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub clients: ServiceClients,
    pub navigator: Arc<CountingNavigator>,
    pub persistence: Arc<dyn TokenPersistence>,
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        services: ServiceEndpoints::uniform(server.uri()),
        ..ClientConfig::default()
    }
}

/// Client set against `server` with an in-memory session
pub fn harness(server: &MockServer) -> Harness {
    harness_with(server, Arc::new(MemoryPersistence::new()))
}

/// Route client logs through the test harness; `RUST_LOG` overrides
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fincrm_http=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn harness_with(server: &MockServer, persistence: Arc<dyn TokenPersistence>) -> Harness {
    init_tracing();
    let navigator = Arc::new(CountingNavigator::default());
    let clients =
        ServiceClients::new(&config_for(server), persistence.clone(), navigator.clone()).unwrap();
    Harness {
        clients,
        navigator,
        persistence,
    }
}

/// Harness with an expired access token `T1` and refresh token `R1`
pub fn logged_in(server: &MockServer) -> Harness {
    let persistence = Arc::new(MemoryPersistence::with_cookie(RefreshCookie::issue(
        "R1",
        CookiePolicy::default(),
    )));
    let harness = harness_with(server, persistence);
    harness.clients.tokens().set_access_token("T1");
    harness
}

/// Refresh endpoint that rotates `R1` into `T2`/`R2` after `delay`
pub async fn mount_refresh_success(server: &MockServer, delay: Duration, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/refresh"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T2", "refresh_token": "R2"}))
                .set_delay(delay),
        )
        .expect(expected_calls)
        .named("token refresh")
        .mount(server)
        .await;
}

/// Refresh endpoint that rejects every refresh token
pub async fn mount_refresh_failure(server: &MockServer, delay: Duration, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("refresh token revoked")
                .set_delay(delay),
        )
        .expect(expected_calls)
        .named("token refresh")
        .mount(server)
        .await;
}
