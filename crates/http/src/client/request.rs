//! Replayable request descriptions

use super::error::ClientError;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// How many times a request has been sent
///
/// A request is replayed at most once after a token refresh; the counter is
/// carried alongside the request rather than stored on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u8);

impl Attempt {
    pub const FIRST: Self = Self(1);

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub const fn is_retry(self) -> bool {
        self.0 > 1
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Attempt {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Everything needed to send, and later resend, a request
///
/// The body is held as a JSON value so the request can be rebuilt after the
/// first attempt consumed its `reqwest::RequestBuilder`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach a raw JSON value as the body
    #[must_use]
    pub fn json_value(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append query parameters from a serializable struct or map
    ///
    /// `null` fields are skipped; other scalars are rendered as strings.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` does not serialize to a flat object
    pub fn query<Q: Serialize + ?Sized>(mut self, params: &Q) -> Result<Self, ClientError> {
        let Value::Object(map) = serde_json::to_value(params)? else {
            return Err(ClientError::Configuration(
                "query parameters must serialize to an object".into(),
            ));
        };

        for (key, value) in map {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Bool(_) | Value::Number(_) => value.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ClientError::Configuration(format!(
                        "query parameter '{key}' must be a scalar"
                    )));
                }
            };
            self.query.push((key, value));
        }
        Ok(self)
    }

    #[must_use]
    pub fn query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}
