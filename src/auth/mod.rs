//! Request authorization
//!
//! Turns the canonical attributes of an object request into the value of the
//! `Authorization` header.
//!
//! - [`LocalAuthorizer`] signs with a locally held key pair
//! - [`RemoteAuthorizer`] delegates signing to a trusted signing service so the
//!   private key never reaches the client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod credentials;
pub mod remote;
pub mod signer;

pub use credentials::{Credentials, CredentialsProvider};
pub use remote::RemoteAuthorizer;
pub use signer::LocalAuthorizer;

/// Authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Remote signing failed: {0}")]
    Remote(String),

    #[error("Invalid signing response: {0}")]
    InvalidResponse(String),
}

/// HTTP methods used by object operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }
}

/// Canonical request attributes covered by the signature
///
/// Built per request and consumed by an [`ObjectAuthorizer`]; it is also the
/// JSON document forwarded to a remote signing service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationContext {
    pub method: HttpMethod,
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    /// Lowercase hex MD5, or empty when integrity verification is off
    pub content_md5: String,
    /// Value of the `Date` header
    pub date: String,
    /// Base64 callback-policy token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_policy: Option<String>,
    /// Caller-defined payload for remote signing services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<serde_json::Value>,
}

impl AuthorizationContext {
    pub fn new(
        method: HttpMethod,
        bucket: impl Into<String>,
        key: impl Into<String>,
        content_type: impl Into<String>,
        content_md5: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            method,
            bucket: bucket.into(),
            key: key.into(),
            content_type: content_type.into(),
            content_md5: content_md5.into(),
            date: date.into(),
            put_policy: None,
            optional: None,
        }
    }

    #[must_use]
    pub fn with_put_policy(mut self, token: Option<String>) -> Self {
        self.put_policy = token;
        self
    }

    #[must_use]
    pub fn with_optional(mut self, optional: Option<serde_json::Value>) -> Self {
        self.optional = optional;
        self
    }
}

/// Produces `Authorization` header values for object requests
///
/// Implementations hold only read-only state and may be shared between any
/// number of concurrent uploads.
#[async_trait]
pub trait ObjectAuthorizer: Send + Sync {
    /// Authorize a request described by `ctx`
    async fn authorize(&self, ctx: &AuthorizationContext) -> Result<String, AuthError>;
}

/// Format a timestamp the way the `Date` header expects
pub fn format_date(time: chrono::DateTime<chrono::Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
