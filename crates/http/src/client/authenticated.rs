//! Bearer-authenticated client bound to one service

use super::error::ClientError;
use super::refresh::RefreshCoordinator;
use super::request::{ApiRequest, Attempt};
use super::tokens::TokenStore;
use fincrm_core::{Service, SessionConfig};
use reqwest::{Client, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Client for one backend service sharing the process-wide session
///
/// Every instance holds the same [`TokenStore`] and [`RefreshCoordinator`],
/// so a refresh triggered through one service benefits all others.
#[derive(Clone)]
pub struct AuthenticatedClient {
    service: Service,
    client: Client,
    base_url: String,
    tokens: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    session: Arc<SessionConfig>,
}

impl AuthenticatedClient {
    pub fn new(
        service: Service,
        client: Client,
        base_url: impl Into<String>,
        tokens: Arc<TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
        session: Arc<SessionConfig>,
    ) -> Self {
        Self {
            service,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            coordinator,
            session,
        }
    }

    pub const fn service(&self) -> Service {
        self.service
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request, recovering once from an expired access token
    ///
    /// A 401 from a non-exempt path is handed to the refresh coordinator and
    /// the request is replayed with the token it returns. A second 401 is
    /// reported as [`ClientError::RetryExhausted`]. Any other failure is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the last attempt,
    /// [`ClientError::SessionLost`] if the session could not be recovered, or
    /// [`ClientError::RetryExhausted`] if the replay was rejected as well
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let mut attempt = Attempt::FIRST;
        let mut token = self.tokens.access_token();

        loop {
            let error = match self.send(&request, token.as_deref(), attempt).await {
                Ok(data) => return Ok(data),
                Err(error) => error,
            };

            if !error.is_auth_failure() || self.session.is_exempt(self.service, request.path()) {
                return Err(error);
            }

            if attempt.is_retry() {
                warn!(
                    service = %self.service,
                    path = request.path(),
                    "Request rejected again after token refresh"
                );
                return Err(ClientError::RetryExhausted {
                    path: request.path().to_string(),
                });
            }

            token = Some(self.coordinator.recover(token.as_deref()).await?);
            attempt = attempt.next();
        }
    }

    /// Issue a single attempt
    async fn send<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        attempt: Attempt,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = self.client.request(request.method().clone(), url);

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        debug!(
            service = %self.service,
            method = %request.method(),
            path = request.path(),
            attempt = attempt.get(),
            authenticated = token.is_some(),
            "Sending request"
        );

        let response = builder.send().await?;
        let status = response.status();
        debug!(
            service = %self.service,
            path = request.path(),
            status = status.as_u16(),
            "Received response"
        );

        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                Ok(serde_json::from_value(serde_json::Value::Null)?)
            } else {
                Ok(serde_json::from_slice(&bytes)?)
            }
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(ApiRequest::delete(path)).await
    }
}
