//! Single-flight token refresh
//!
//! When a protected request comes back with 401 the client hands it to the
//! [`RefreshCoordinator`]. The first caller flips the coordinator into
//! `Refreshing` and starts exactly one call to the refresh endpoint; every
//! caller, the first included, parks a oneshot sender in the queue. When the
//! refresh settles the queue is drained in arrival order with one shared
//! outcome: either the new access token or "session lost".
//!
//! ```text
//!            authFailure (no refresh token) ─► session lost, stay Idle
//!   ┌──────┐ authFailure ──────────────────► ┌────────────┐
//!   │ Idle │                                  │ Refreshing │ ◄─ authFailure (enqueue)
//!   └──────┘ ◄──── refreshSucceeded / Failed ─└────────────┘
//! ```
//!
//! The refresh call runs on its own task, so a caller that drops its future
//! cannot strand the coordinator in `Refreshing`. A refresh task that panics
//! settles the queue as "session lost".

use super::error::ClientError;
use super::session::SessionFailureHandler;
use super::tokens::TokenStore;
use crate::types::{RefreshRequest, TokenPair};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

/// Exchanges a refresh token for a new token pair
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError>;
}

/// Calls `POST {auth}/api/v1/refresh`
pub struct HttpTokenRefresher {
    client: Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, auth_base_url: &str, refresh_path: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", auth_base_url.trim_end_matches('/'), refresh_path),
        }
    }

}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        debug!(url = %self.url, "Refreshing token");

        let response = self
            .client
            .post(&self.url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            warn!(status = %status, "Token refresh rejected");
            return Err(ClientError::from_status(status, message));
        }

        Ok(response.json().await?)
    }
}

/// Observable coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

#[derive(Debug, Clone)]
enum RefreshOutcome {
    Refreshed(String),
    SessionLost,
}

#[derive(Default)]
struct CoordinatorState {
    refreshing: bool,
    queue: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Owns the `refreshing` flag and the queue of requests waiting on it
pub struct RefreshCoordinator {
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    session: Arc<SessionFailureHandler>,
    state: Mutex<CoordinatorState>,
    refresh_calls: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        tokens: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        session: Arc<SessionFailureHandler>,
    ) -> Self {
        Self {
            tokens,
            refresher,
            session,
            state: Mutex::new(CoordinatorState::default()),
            refresh_calls: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> RefreshState {
        if self.state.lock().await.refreshing {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Number of requests parked behind the in-flight refresh
    pub async fn pending(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Refresh calls issued since construction
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    /// Obtain an access token to replay a request that failed with 401
    ///
    /// `failed_with` is the access token the failed request carried. If the
    /// store already holds a different one, a refresh has completed since the
    /// request was sent and that token is returned without another refresh.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionLost`] when no refresh token is stored or
    /// the refresh call fails. Tokens are cleared and the session failure
    /// handler has run by the time the error is returned.
    pub async fn recover(self: &Arc<Self>, failed_with: Option<&str>) -> Result<String, ClientError> {
        let receiver = {
            let mut state = self.state.lock().await;

            if !state.refreshing {
                if let Some(current) = self.tokens.access_token() {
                    if failed_with != Some(current.as_str()) {
                        debug!("Access token was rotated while the request was in flight");
                        return Ok(current);
                    }
                }

                let Some(refresh_token) = self.tokens.refresh_token() else {
                    drop(state);
                    warn!("No refresh token available, session lost");
                    self.session.on_session_lost();
                    return Err(ClientError::SessionLost);
                };

                state.refreshing = true;
                debug!("Auth state transition: Idle -> Refreshing");
                self.spawn_refresh(refresh_token);
            }

            let (sender, receiver) = oneshot::channel();
            state.queue.push_back(sender);
            debug!(queued = state.queue.len(), "Waiting for token refresh");
            receiver
        };

        match receiver.await {
            Ok(RefreshOutcome::Refreshed(token)) => Ok(token),
            Ok(RefreshOutcome::SessionLost) | Err(_) => Err(ClientError::SessionLost),
        }
    }

    fn spawn_refresh(self: &Arc<Self>, refresh_token: String) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            // A panicking refresher must still settle the queue.
            let attempt = tokio::spawn(Arc::clone(&coordinator).refresh_once(refresh_token));
            let outcome = attempt.await.unwrap_or_else(|error| {
                warn!(%error, "Token refresh task failed, clearing session");
                coordinator.tokens.clear();
                RefreshOutcome::SessionLost
            });
            coordinator.settle(outcome).await;
        });
    }

    async fn refresh_once(self: Arc<Self>, refresh_token: String) -> RefreshOutcome {
        self.refresh_calls.fetch_add(1, Ordering::Relaxed);

        match self.refresher.refresh(&refresh_token).await {
            Ok(pair) => {
                self.tokens.store_pair(&pair);
                info!("Token refreshed successfully");
                RefreshOutcome::Refreshed(pair.access_token)
            }
            Err(error) => {
                warn!(%error, "Token refresh failed, clearing session");
                self.tokens.clear();
                RefreshOutcome::SessionLost
            }
        }
    }

    /// Leave `Refreshing` and hand `outcome` to every queued request
    async fn settle(&self, outcome: RefreshOutcome) {
        if matches!(outcome, RefreshOutcome::SessionLost) {
            self.session.on_session_lost();
        }

        let waiters = {
            let mut state = self.state.lock().await;
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };
        debug!(
            waiters = waiters.len(),
            "Auth state transition: Refreshing -> Idle"
        );

        for waiter in waiters {
            // A dropped receiver means the caller lost interest.
            let _ = waiter.send(outcome.clone());
        }
    }
}
