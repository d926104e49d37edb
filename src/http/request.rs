//! Request descriptors.
//!
//! An [`Endpoint`] is everything needed to repeat a request: the body is held
//! as bytes so each attempt can send an identical copy.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::http::error::RequestError;

/// Header carrying the logical request ID, repeated on every attempt.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generate a new request ID (UUID v4).
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Target of one logical request.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Per-attempt deadline; the executor default applies when unset.
    pub timeout: Option<Duration>,
    /// Retry settings for this request only.
    pub retry: Option<RetryConfig>,
}

impl Endpoint {
    pub fn new(method: Method, url: &str) -> Result<Self, RequestError> {
        let url = Url::parse(url)
            .map_err(|e| RequestError::InvalidRequest(format!("invalid URL '{}': {}", url, e)))?;
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            retry: None,
        })
    }

    pub fn get(url: &str) -> Result<Self, RequestError> {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Result<Self, RequestError> {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, RequestError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RequestError::InvalidRequest(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RequestError::InvalidRequest(format!("invalid value for header '{}': {}", name.as_str(), e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn bearer_auth(self, token: &str) -> Result<Self, RequestError> {
        self.header(AUTHORIZATION.as_str(), &format!("Bearer {}", token))
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, RequestError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| RequestError::InvalidRequest(format!("failed to encode JSON body: {}", e)))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(body);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}
