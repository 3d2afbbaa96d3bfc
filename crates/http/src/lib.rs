//! Fincrm HTTP client layer
//!
//! Bearer-authenticated clients for the auth, wallet, transaction, ledger and
//! analytics services, sharing one session with single-flight token refresh.

pub mod client;
pub mod types;

pub use client::{
    ApiRequest, AuthApi, AuthenticatedClient, ClientError, NavigationPort, RefreshCoordinator,
    ServiceClients, TokenPersistence, TokenStore,
};
pub use fincrm_core::{ClientConfig, Service};
pub use reqwest::Method;
pub use types::TokenPair;
