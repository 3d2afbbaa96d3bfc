//! Refresh-token cookie
//!
//! The refresh token is persisted the way a browser would keep it: a
//! same-site, path-scoped cookie with an absolute expiry, marked `Secure` when
//! the auth service is reached over https. Non-browser hosts store the
//! serialized cookie through a [`TokenPersistence`](super::persistence::TokenPersistence).

use super::persistence::PersistenceError;
use cookie::time::{Duration, OffsetDateTime, PrimitiveDateTime};
use cookie::{Cookie, SameSite};
use fincrm_core::MAX_REFRESH_TOKEN_TTL_DAYS;
use std::fmt;

/// Cookie name used for the refresh token
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Attributes applied to newly issued refresh cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    /// Validity from issuance
    pub ttl: Duration,
    /// Set the `Secure` attribute
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            secure: false,
        }
    }
}

impl CookiePolicy {
    /// Derive the policy from the auth service URL
    ///
    /// The cookie is secure whenever the auth service is served over https.
    ///
    /// # Errors
    ///
    /// Returns an error if `auth_base_url` cannot be parsed
    pub fn for_auth_url(auth_base_url: &str, ttl_days: i64) -> Result<Self, url::ParseError> {
        let url = url::Url::parse(auth_base_url)?;
        Ok(Self {
            ttl: Duration::days(ttl_days.clamp(0, MAX_REFRESH_TOKEN_TTL_DAYS)),
            secure: url.scheme() == "https",
        })
    }
}

/// A refresh token together with its cookie attributes
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshCookie {
    token: String,
    path: String,
    secure: bool,
    expires_at: OffsetDateTime,
}

impl RefreshCookie {
    /// Issue a cookie for `token` expiring `policy.ttl` from now
    pub fn issue(token: impl Into<String>, policy: CookiePolicy) -> Self {
        Self::issue_at(token, policy, OffsetDateTime::now_utc())
    }

    /// Issue a cookie as if it were created at `issued_at`
    ///
    /// An expiry past the last representable date saturates to it.
    pub fn issue_at(token: impl Into<String>, policy: CookiePolicy, issued_at: OffsetDateTime) -> Self {
        let expires_at = issued_at
            .checked_add(policy.ttl)
            .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());
        // Cookie expiry has second precision on the wire.
        let expires_at = expires_at.replace_nanosecond(0).unwrap_or(expires_at);
        Self {
            token: token.into(),
            path: "/".to_string(),
            secure: policy.secure,
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub const fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Build the equivalent `cookie::Cookie`
    pub fn to_cookie(&self) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE_NAME, self.token.clone()))
            .path(self.path.clone())
            .same_site(SameSite::Strict)
            .secure(self.secure)
            .expires(self.expires_at)
            .build()
    }

    /// Render as a `Set-Cookie` header value
    pub fn to_header_value(&self) -> String {
        self.to_cookie().encoded().to_string()
    }

    /// Parse a value previously produced by [`Self::to_header_value`]
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a refresh cookie with an expiry
    pub fn parse(value: &str) -> Result<Self, PersistenceError> {
        let cookie = Cookie::parse_encoded(value.trim().to_string())
            .map_err(|e| PersistenceError::Cookie(e.to_string()))?;

        if cookie.name() != REFRESH_COOKIE_NAME {
            return Err(PersistenceError::Cookie(format!(
                "unexpected cookie name '{}'",
                cookie.name()
            )));
        }

        let expires_at = cookie
            .expires_datetime()
            .ok_or_else(|| PersistenceError::Cookie("refresh cookie has no expiry".into()))?;

        if cookie.value().is_empty() {
            return Err(PersistenceError::Cookie("refresh cookie is empty".into()));
        }

        Ok(Self {
            token: cookie.value().to_string(),
            path: cookie.path().unwrap_or("/").to_string(),
            secure: cookie.secure().unwrap_or(false),
            expires_at,
        })
    }
}

impl fmt::Debug for RefreshCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCookie")
            .field("token", &"<redacted>")
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
