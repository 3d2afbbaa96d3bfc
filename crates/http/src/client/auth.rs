//! Authentication API client methods

use super::authenticated::AuthenticatedClient;
use super::error::ClientError;
use super::services::ServiceClients;
use super::tokens::TokenStore;
use crate::types::{LoginRequest, RegisterRequest, TokenPair};
use std::sync::Arc;
use tracing::{debug, info};

pub const LOGIN_PATH: &str = "/api/v1/login";
pub const REGISTER_PATH: &str = "/api/v1/register";

/// Login, registration and logout against the auth service
#[derive(Clone)]
pub struct AuthApi {
    client: AuthenticatedClient,
    tokens: Arc<TokenStore>,
}

impl AuthApi {
    pub const fn new(client: AuthenticatedClient, tokens: Arc<TokenStore>) -> Self {
        Self { client, tokens }
    }

    /// Exchange credentials for a token pair and start a session
    ///
    /// # Errors
    ///
    /// Bad credentials surface as [`ClientError::AuthenticationFailed`] and
    /// never trigger a refresh or a redirect
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<TokenPair, ClientError> {
        let request = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        let pair: TokenPair = self.client.post(LOGIN_PATH, &request).await?;
        self.tokens.store_pair(&pair);
        info!("Logged in");
        Ok(pair)
    }

    /// Create an account and start a session
    ///
    /// # Errors
    ///
    /// Returns the error reported by the auth service
    pub async fn register(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<TokenPair, ClientError> {
        let request = RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        };
        let pair: TokenPair = self.client.post(REGISTER_PATH, &request).await?;
        self.tokens.store_pair(&pair);
        info!("Registered new account");
        Ok(pair)
    }

    /// End the session locally
    pub fn logout(&self) {
        self.tokens.clear();
        info!("Logged out");
    }

    /// Whether a previous session can be resumed
    ///
    /// After a restart only the refresh token survives; the first protected
    /// request obtains a new access token through the refresh protocol.
    pub fn restore(&self) -> bool {
        let restorable = self.tokens.has_refresh_token();
        debug!(restorable, "Checked for persisted session");
        restorable
    }
}

impl ServiceClients {
    /// Auth endpoint wrappers sharing this client set's session
    pub fn auth_api(&self) -> AuthApi {
        AuthApi::new(self.auth().clone(), self.tokens().clone())
    }
}
