//! Token store shared by every service client

use super::persistence::TokenPersistence;
use super::refresh_cookie::{CookiePolicy, RefreshCookie};
use crate::types::TokenPair;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::{debug, warn};

/// Holds the access token in memory and the refresh token in persistence
///
/// The access token is never written anywhere; it is gone after a restart and
/// recovered through the refresh protocol. Persistence failures are logged
/// and read back as "no token".
pub struct TokenStore {
    access: ArcSwapOption<String>,
    persistence: Arc<dyn TokenPersistence>,
    policy: CookiePolicy,
}

impl TokenStore {
    pub fn new(persistence: Arc<dyn TokenPersistence>, policy: CookiePolicy) -> Self {
        Self {
            access: ArcSwapOption::empty(),
            persistence,
            policy,
        }
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.access.store(Some(Arc::new(token.into())));
    }

    pub fn access_token(&self) -> Option<String> {
        self.access.load_full().map(|token| token.as_ref().clone())
    }

    /// Persist a refresh token with a fresh expiry
    pub fn set_refresh_token(&self, token: impl Into<String>) {
        let cookie = RefreshCookie::issue(token, self.policy);
        if let Err(error) = self.persistence.save(&cookie) {
            warn!(%error, "Failed to persist refresh token");
        }
    }

    /// The persisted refresh cookie, if present and not expired
    pub fn refresh_cookie(&self) -> Option<RefreshCookie> {
        match self.persistence.load() {
            Ok(Some(cookie)) if cookie.is_expired() => {
                debug!("Stored refresh token has expired, discarding it");
                if let Err(error) = self.persistence.clear() {
                    warn!(%error, "Failed to remove expired refresh token");
                }
                None
            }
            Ok(cookie) => cookie,
            Err(error) => {
                warn!(%error, "Failed to read refresh token, treating it as absent");
                None
            }
        }
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_cookie().map(|cookie| cookie.token().to_string())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_cookie().is_some()
    }

    /// Store both halves of a freshly issued pair
    pub fn store_pair(&self, pair: &TokenPair) {
        self.set_access_token(pair.access_token.as_str());
        self.set_refresh_token(pair.refresh_token.as_str());
    }

    /// Remove both tokens; safe to call repeatedly
    pub fn clear(&self) {
        self.access.store(None);
        if let Err(error) = self.persistence.clear() {
            warn!(%error, "Failed to clear persisted refresh token");
        }
    }

    pub const fn policy(&self) -> CookiePolicy {
        self.policy
    }
}
