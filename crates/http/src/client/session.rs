//! Session-lost handling

use super::navigation::NavigationPort;
use super::tokens::TokenStore;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Clears credentials and sends the user to the login surface exactly once
pub struct SessionFailureHandler {
    tokens: Arc<TokenStore>,
    navigation: Arc<dyn NavigationPort>,
    // Serializes the location check with the redirect.
    redirect_lock: Mutex<()>,
}

impl SessionFailureHandler {
    pub fn new(tokens: Arc<TokenStore>, navigation: Arc<dyn NavigationPort>) -> Self {
        Self {
            tokens,
            navigation,
            redirect_lock: Mutex::new(()),
        }
    }

    /// Clear all tokens and redirect to login unless already there
    pub fn on_session_lost(&self) {
        self.tokens.clear();

        let _guard = self
            .redirect_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.navigation.current_path_is_login() {
            debug!("Session lost while on the login surface, not redirecting");
            return;
        }

        warn!("Session lost, redirecting to login");
        self.navigation.redirect_to_login();
    }
}
