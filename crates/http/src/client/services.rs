//! The process-wide set of service clients

use super::authenticated::AuthenticatedClient;
use super::error::ClientError;
use super::navigation::{NavigationPort, RouteNavigator};
use super::persistence::{MemoryPersistence, TokenPersistence};
use super::refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
use super::refresh_cookie::CookiePolicy;
use super::session::SessionFailureHandler;
use super::tokens::TokenStore;
use fincrm_core::{ClientConfig, Service};
use reqwest::ClientBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One [`AuthenticatedClient`] per backend, all sharing one session
///
/// Built once at start-up and kept for the lifetime of the process.
pub struct ServiceClients {
    auth: AuthenticatedClient,
    wallet: AuthenticatedClient,
    transaction: AuthenticatedClient,
    ledger: AuthenticatedClient,
    analytics: AuthenticatedClient,
    tokens: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ServiceClients {
    /// Build the client set with the given persistence and navigation ports
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the auth base
    /// URL is invalid
    pub fn new(
        config: &ClientConfig,
        persistence: Arc<dyn TokenPersistence>,
        navigation: Arc<dyn NavigationPort>,
    ) -> Result<Self, ClientError> {
        Self::builder(config.clone())
            .persistence(persistence)
            .navigation(navigation)
            .build()
    }

    /// Create a new builder
    pub fn builder(config: ClientConfig) -> ServiceClientsBuilder {
        ServiceClientsBuilder {
            config,
            persistence: None,
            navigation: None,
            refresher: None,
        }
    }

    /// Client bound to `service`
    pub const fn get(&self, service: Service) -> &AuthenticatedClient {
        match service {
            Service::Auth => &self.auth,
            Service::Wallet => &self.wallet,
            Service::Transaction => &self.transaction,
            Service::Ledger => &self.ledger,
            Service::Analytics => &self.analytics,
        }
    }

    pub const fn auth(&self) -> &AuthenticatedClient {
        &self.auth
    }

    pub const fn wallet(&self) -> &AuthenticatedClient {
        &self.wallet
    }

    pub const fn transaction(&self) -> &AuthenticatedClient {
        &self.transaction
    }

    pub const fn ledger(&self) -> &AuthenticatedClient {
        &self.ledger
    }

    pub const fn analytics(&self) -> &AuthenticatedClient {
        &self.analytics
    }

    pub const fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub const fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }
}

/// Builder for [`ServiceClients`]
///
/// Ports that are not set fall back to in-memory persistence, a
/// [`RouteNavigator`] starting at `/` and an HTTP refresher against the auth
/// service.
pub struct ServiceClientsBuilder {
    config: ClientConfig,
    persistence: Option<Arc<dyn TokenPersistence>>,
    navigation: Option<Arc<dyn NavigationPort>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl ServiceClientsBuilder {
    /// Set where the refresh token is persisted
    #[must_use]
    pub fn persistence(mut self, persistence: Arc<dyn TokenPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the navigation port used when the session is lost
    #[must_use]
    pub fn navigation(mut self, navigation: Arc<dyn NavigationPort>) -> Self {
        self.navigation = Some(navigation);
        self
    }

    /// Replace the HTTP token refresher
    #[must_use]
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Build the client set
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the auth base
    /// URL is invalid
    pub fn build(self) -> Result<ServiceClients, ClientError> {
        let config = self.config;

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        let policy =
            CookiePolicy::for_auth_url(&config.services.auth, config.session.refresh_token_ttl_days)?;
        let persistence = self
            .persistence
            .unwrap_or_else(|| Arc::new(MemoryPersistence::new()));
        let tokens = Arc::new(TokenStore::new(persistence, policy));

        let navigation = self
            .navigation
            .unwrap_or_else(|| Arc::new(RouteNavigator::new(config.session.login_route.as_str(), "/")));
        let session_handler = Arc::new(SessionFailureHandler::new(tokens.clone(), navigation));

        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(
                client.clone(),
                &config.services.auth,
                &config.session.refresh_path,
            ))
        });
        let coordinator = Arc::new(RefreshCoordinator::new(
            tokens.clone(),
            refresher,
            session_handler,
        ));

        let session = Arc::new(config.session.clone());
        let make = |service: Service| {
            debug!(
                service = %service,
                base_url = config.services.url(service),
                "Creating service client"
            );
            AuthenticatedClient::new(
                service,
                client.clone(),
                config.services.url(service),
                tokens.clone(),
                coordinator.clone(),
                session.clone(),
            )
        };

        let auth = make(Service::Auth);
        let wallet = make(Service::Wallet);
        let transaction = make(Service::Transaction);
        let ledger = make(Service::Ledger);
        let analytics = make(Service::Analytics);

        Ok(ServiceClients {
            auth,
            wallet,
            transaction,
            ledger,
            analytics,
            tokens,
            coordinator,
        })
    }
}
