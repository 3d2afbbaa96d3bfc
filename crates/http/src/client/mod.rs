//! Authenticated HTTP clients for the fincrm services
//!
//! Every service client attaches the current access token as a bearer
//! credential. When a protected request is rejected with 401 the shared
//! [`RefreshCoordinator`] refreshes the session once, no matter how many
//! requests failed, and each request is replayed a single time with the new
//! token. If the session cannot be recovered the tokens are cleared and the
//! [`SessionFailureHandler`] sends the user back to the login route.

pub mod auth;
pub mod authenticated;
pub mod error;
pub mod navigation;
pub mod persistence;
pub mod refresh;
pub mod refresh_cookie;
pub mod request;
pub mod services;
pub mod session;
pub mod tokens;

pub use auth::AuthApi;
pub use authenticated::AuthenticatedClient;
pub use error::ClientError;
pub use navigation::{NavigationPort, RouteNavigator};
pub use persistence::{FilePersistence, MemoryPersistence, PersistenceError, TokenPersistence};
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, RefreshState, TokenRefresher};
pub use refresh_cookie::{CookiePolicy, REFRESH_COOKIE_NAME, RefreshCookie};
pub use request::{ApiRequest, Attempt};
pub use services::{ServiceClients, ServiceClientsBuilder};
pub use session::SessionFailureHandler;
pub use tokens::TokenStore;
