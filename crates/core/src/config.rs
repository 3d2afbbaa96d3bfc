//! Client configuration
//!
//! One base URL per backend service plus the session settings consumed by the
//! refresh protocol. Values are layered from defaults, an optional file and
//! `FINCRM__*` environment variables.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "FINCRM";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Backend services the dashboard talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Auth,
    Wallet,
    Transaction,
    Ledger,
    Analytics,
}

impl Service {
    pub const ALL: [Self; 5] = [
        Self::Auth,
        Self::Wallet,
        Self::Transaction,
        Self::Ledger,
        Self::Analytics,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Wallet => "wallet",
            Self::Transaction => "transaction",
            Self::Ledger => "ledger",
            Self::Analytics => "analytics",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|service| service.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::invalid_config(format!("unknown service '{s}'")))
    }
}

/// Base URLs for each backend service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    pub auth: String,
    pub wallet: String,
    pub transaction: String,
    pub ledger: String,
    pub analytics: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            auth: DEFAULT_BASE_URL.to_string(),
            wallet: DEFAULT_BASE_URL.to_string(),
            transaction: DEFAULT_BASE_URL.to_string(),
            ledger: DEFAULT_BASE_URL.to_string(),
            analytics: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ServiceEndpoints {
    /// Base URL configured for a service
    pub fn url(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth,
            Service::Wallet => &self.wallet,
            Service::Transaction => &self.transaction,
            Service::Ledger => &self.ledger,
            Service::Analytics => &self.analytics,
        }
    }

    /// Point every service at the same base URL
    pub fn uniform(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            auth: base_url.clone(),
            wallet: base_url.clone(),
            transaction: base_url.clone(),
            ledger: base_url.clone(),
            analytics: base_url,
        }
    }

    fn validate(&self) -> CoreResult<()> {
        for service in Service::ALL {
            let parsed = url::Url::parse(self.url(service))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CoreError::invalid_config(format!(
                    "{service} base URL must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}

/// Settings for the two-token session model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Route the navigator redirects to when the session is lost
    pub login_route: String,
    /// Path of the token refresh endpoint on the auth service
    pub refresh_path: String,
    /// Auth service endpoints whose 401 responses are returned to the caller
    /// unchanged
    pub exempt_paths: Vec<String>,
    /// Validity of a refresh token from issuance
    pub refresh_token_ttl_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_route: "/login".to_string(),
            refresh_path: "/api/v1/refresh".to_string(),
            exempt_paths: vec![
                "/api/v1/login".to_string(),
                "/api/v1/register".to_string(),
                "/api/v1/refresh".to_string(),
            ],
            refresh_token_ttl_days: 7,
        }
    }
}

impl SessionConfig {
    /// Whether a request to `service` at `path` is exempt from the refresh
    /// protocol
    ///
    /// Only auth service paths are ever exempt. Query strings and trailing
    /// slashes are ignored; the rest of the path must match exactly.
    pub fn is_exempt(&self, service: Service, path: &str) -> bool {
        if service != Service::Auth {
            return false;
        }
        let path = normalize_path(path);
        self.exempt_paths
            .iter()
            .any(|exempt| path == normalize_path(exempt))
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Longest accepted refresh token validity
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 3650;

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Base URL per backend service
    pub services: ServiceEndpoints,

    /// Session and refresh settings
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("fincrm-client/{}", env!("CARGO_PKG_VERSION")),
            services: ServiceEndpoints::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a value cannot be parsed, or
    /// a service URL is invalid
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = ::config::Config::builder()
            .set_default("services.auth", defaults.services.auth)?
            .set_default("services.wallet", defaults.services.wallet)?
            .set_default("services.transaction", defaults.services.transaction)?
            .set_default("services.ledger", defaults.services.ledger)?
            .set_default("services.analytics", defaults.services.analytics)?
            .set_default("session.login_route", defaults.session.login_route)?
            .set_default("session.refresh_path", defaults.session.refresh_path)?
            .set_default("session.exempt_paths", defaults.session.exempt_paths)?
            .set_default(
                "session.refresh_token_ttl_days",
                defaults.session.refresh_token_ttl_days,
            )?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("user_agent", defaults.user_agent)?;

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("session.exempt_paths")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns an error for unparseable base URLs or a token TTL outside
    /// `1..=MAX_REFRESH_TOKEN_TTL_DAYS`
    pub fn validate(&self) -> CoreResult<()> {
        self.services.validate()?;
        if self.session.refresh_token_ttl_days <= 0 {
            return Err(CoreError::invalid_config(
                "session.refresh_token_ttl_days must be positive",
            ));
        }
        if self.session.refresh_token_ttl_days > MAX_REFRESH_TOKEN_TTL_DAYS {
            return Err(CoreError::invalid_config(format!(
                "session.refresh_token_ttl_days must be at most {MAX_REFRESH_TOKEN_TTL_DAYS}"
            )));
        }
        if !self.session.refresh_path.starts_with('/') {
            return Err(CoreError::invalid_config(
                "session.refresh_path must start with '/'",
            ));
        }
        Ok(())
    }
}
