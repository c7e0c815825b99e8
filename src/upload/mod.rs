//! Upload module
//!
//! Object operations executed by [`crate::store::UfileClient`]. Each operation
//! implements [`ObjectApi`]: it prepares a signed request, then turns the raw
//! response into a typed result. The set of operations is closed:
//!
//! | Tag | Operation | Output |
//! |-----|-----------|--------|
//! | [`ApiKind::PutFile`] | [`put_file::PutFile`] | [`UploadResult`] |
//! | [`ApiKind::UploadHit`] | [`upload_hit::UploadHit`] | [`upload_hit::HitOutcome`] |

use crate::auth::{AuthError, HttpMethod, ObjectAuthorizer};
use crate::store::Endpoint;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod integrity;
pub mod policy;
pub mod progress;
pub mod put_file;
pub mod request;
pub mod response;
pub mod upload_hit;

pub use integrity::{ContentMd5, DigestFailurePolicy};
pub use policy::PutPolicy;
pub use progress::{ProgressObserver, ProgressTracker};
pub use put_file::PutFile;
pub use request::{UploadRequest, UploadRequestBuilder};
pub use response::{ErrorResult, RawResponse};
pub use upload_hit::{HitOutcome, UploadHit, UploadHitRequest};

/// Default transfer buffer size (256 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Required parameter missing: {0}")]
    RequiredParam(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("File error: {0}")]
    File(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to compute Content-MD5: {0}")]
    IntegrityDigest(#[source] std::io::Error),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(ErrorResult),

    #[error("Policy serialization error: {0}")]
    Policy(#[from] serde_json::Error),

    #[error("Upload task failed: {0}")]
    Task(String),
}

impl UploadError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::RequiredParam(_) | UploadError::InvalidParam(_) => "param",
            UploadError::File(_) => "file",
            UploadError::Io(_) => "io",
            UploadError::IntegrityDigest(_) => "integrity",
            UploadError::Auth(_) => "auth",
            UploadError::Transport(_) => "transport",
            UploadError::Store(_) => "store",
            UploadError::Policy(_) => "policy",
            UploadError::Task(_) => "task",
        }
    }

    /// The store's structured error, if this is a protocol error
    pub fn store_error(&self) -> Option<&ErrorResult> {
        match self {
            UploadError::Store(result) => Some(result),
            _ => None,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Object identifier with surrounding quotes stripped
    pub etag: Option<String>,
    /// Callback execution result, present only when a put policy was set
    pub callback_ret: Option<String>,
    pub bytes_sent: u64,
}

/// Outcome of the combined upload-hit + put flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The store already held identical content; nothing was transferred
    Deduplicated {
        /// Fingerprint the store matched
        etag: String,
    },
    Uploaded(UploadResult),
}

/// Operation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
    PutFile,
    UploadHit,
}

impl ApiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKind::PutFile => "put_file",
            ApiKind::UploadHit => "upload_hit",
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operation needs from the client while preparing a request
pub struct ApiContext<'a> {
    pub endpoint: &'a Endpoint,
    pub authorizer: &'a dyn ObjectAuthorizer,
}

/// A signed request ready to hand to the transport
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<reqwest::Body>,
    /// Tracker to finish once the response arrives
    pub progress: Option<Arc<ProgressTracker>>,
}

mod sealed {
    pub trait Sealed {}
}

/// Capability shared by every object operation
///
/// Sealed: the operations in this module are the complete set.
#[async_trait]
pub trait ObjectApi: sealed::Sealed + Send + Sync {
    type Output: Send;

    fn kind(&self) -> ApiKind;

    /// Destination bucket, for logs and metrics
    fn bucket(&self) -> &str;

    /// Hash, sign and build the request
    async fn prepare(&self, ctx: &ApiContext<'_>) -> Result<PreparedRequest, UploadError>;

    /// Interpret a 2xx response
    fn parse_success(&self, response: RawResponse) -> Result<Self::Output, UploadError>;

    /// Interpret a non-2xx response
    ///
    /// Most operations turn this into [`UploadError::Store`]; lookups may map
    /// particular statuses to a regular outcome.
    fn parse_error(&self, response: RawResponse) -> Result<Self::Output, UploadError>;
}

/// Build a header value, reporting which header was malformed
pub(crate) fn header_value(
    name: &str,
    value: &str,
) -> Result<reqwest::header::HeaderValue, UploadError> {
    reqwest::header::HeaderValue::from_str(value)
        .map_err(|_| UploadError::InvalidParam(format!("invalid value for header '{}'", name)))
}
