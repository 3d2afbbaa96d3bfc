//! Navigation port used when the session is lost

use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Host-specific navigation to the login surface
#[cfg_attr(test, mockall::automock)]
pub trait NavigationPort: Send + Sync {
    /// Move the user to the login surface
    fn redirect_to_login(&self);

    /// Whether the user is already on the login surface
    fn current_path_is_login(&self) -> bool;
}

/// Navigator that tracks a route string, for hosts without a browser location
pub struct RouteNavigator {
    login_route: String,
    current: Mutex<String>,
}

impl RouteNavigator {
    pub fn new(login_route: impl Into<String>, initial_route: impl Into<String>) -> Self {
        Self {
            login_route: login_route.into(),
            current: Mutex::new(initial_route.into()),
        }
    }

    pub fn current_route(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record a navigation initiated by the host
    pub fn navigate(&self, route: impl Into<String>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = route.into();
    }
}

impl NavigationPort for RouteNavigator {
    fn redirect_to_login(&self) {
        warn!(route = %self.login_route, "Session expired, please log in again");
        self.navigate(self.login_route.clone());
    }

    fn current_path_is_login(&self) -> bool {
        let current = self.current_route();
        let path = current.split(['?', '#']).next().unwrap_or_default();
        path.trim_end_matches('/') == self.login_route.trim_end_matches('/')
    }
}
