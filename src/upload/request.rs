//! Upload request
//!
//! [`UploadRequest`] is the immutable description of one upload. It can only
//! be obtained from [`UploadRequestBuilder::build`], which runs every
//! parameter and file check up front so that nothing invalid ever reaches
//! hashing, signing or the network.
//!
//! # Example
//!
//! ```no_run
//! use ufile_uploadr::upload::UploadRequestBuilder;
//!
//! # fn example() -> Result<(), ufile_uploadr::upload::UploadError> {
//! let request = UploadRequestBuilder::new()
//!     .from_file("photos/cat.jpg", "image/jpeg")
//!     .name_as("2024/cat.jpg")
//!     .to_bucket("demo-bucket")
//!     .buffer_size(64 * 1024)
//!     .build()?;
//! assert_eq!(request.key(), "2024/cat.jpg");
//! # Ok(())
//! # }
//! ```

use super::integrity::DigestFailurePolicy;
use super::policy::PutPolicy;
use super::upload_hit::UploadHitRequest;
use super::{UploadError, DEFAULT_BUFFER_SIZE};
use mime::Mime;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Validated upload parameters
#[derive(Debug, Clone)]
pub struct UploadRequest {
    bucket: String,
    key: String,
    file: PathBuf,
    file_size: u64,
    content_type: Mime,
    verify_md5: bool,
    buffer_size: usize,
    put_policy: Option<PutPolicy>,
    auth_optional_data: Option<serde_json::Value>,
    on_digest_failure: DigestFailurePolicy,
}

impl UploadRequest {
    pub fn builder() -> UploadRequestBuilder {
        UploadRequestBuilder::new()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// File size observed at build time; sent as `Content-Length`
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn verify_md5(&self) -> bool {
        self.verify_md5
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn put_policy(&self) -> Option<&PutPolicy> {
        self.put_policy.as_ref()
    }

    pub fn auth_optional_data(&self) -> Option<&serde_json::Value> {
        self.auth_optional_data.as_ref()
    }

    pub fn on_digest_failure(&self) -> DigestFailurePolicy {
        self.on_digest_failure
    }

    /// Upload-hit lookup for the same destination and file
    pub fn hit_request(&self, block_size: usize) -> Result<UploadHitRequest, UploadError> {
        if block_size == 0 {
            return Err(UploadError::InvalidParam(
                "fingerprint block size must be positive".into(),
            ));
        }
        Ok(UploadHitRequest::from_validated(
            self.bucket.clone(),
            self.key.clone(),
            self.file.clone(),
            self.file_size,
            block_size,
        )
        .with_optional_data(self.auth_optional_data.clone()))
    }
}

/// Builder for [`UploadRequest`]
///
/// Setters never fail; all validation happens in [`UploadRequestBuilder::build`].
#[derive(Debug, Clone)]
pub struct UploadRequestBuilder {
    bucket: Option<String>,
    key: Option<String>,
    file: Option<PathBuf>,
    content_type: Option<String>,
    verify_md5: bool,
    buffer_size: usize,
    put_policy: Option<PutPolicy>,
    auth_optional_data: Option<serde_json::Value>,
    on_digest_failure: DigestFailurePolicy,
}

impl Default for UploadRequestBuilder {
    fn default() -> Self {
        Self {
            bucket: None,
            key: None,
            file: None,
            content_type: None,
            verify_md5: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
            put_policy: None,
            auth_optional_data: None,
            on_digest_failure: DigestFailurePolicy::default(),
        }
    }
}

impl UploadRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object key to store the file under
    #[must_use]
    pub fn name_as(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Source file and its declared media type
    #[must_use]
    pub fn from_file(mut self, path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        self.file = Some(path.into());
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn to_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Send and sign a whole-file `Content-MD5` (default on)
    #[must_use]
    pub fn verify_md5(mut self, verify: bool) -> Self {
        self.verify_md5 = verify;
        self
    }

    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    #[must_use]
    pub fn put_policy(mut self, policy: PutPolicy) -> Self {
        self.put_policy = Some(policy);
        self
    }

    /// Extra payload forwarded to remote signing services
    #[must_use]
    pub fn auth_optional_data(mut self, data: serde_json::Value) -> Self {
        self.auth_optional_data = Some(data);
        self
    }

    #[must_use]
    pub fn on_digest_failure(mut self, policy: DigestFailurePolicy) -> Self {
        self.on_digest_failure = policy;
        self
    }

    /// Validate and freeze the request
    ///
    /// Parameter checks run first, then the file is checked to exist, to be a
    /// regular file and to be readable.
    pub fn build(self) -> Result<UploadRequest, UploadError> {
        let bucket = required("bucket", self.bucket)?;
        let key = required("key", self.key)?;
        let file = self
            .file
            .ok_or_else(|| UploadError::RequiredParam("file".into()))?;
        let content_type = required("content type", self.content_type)?;

        let content_type: Mime = content_type.parse().map_err(|_| {
            UploadError::InvalidParam(format!("invalid content type '{}'", content_type))
        })?;

        if self.buffer_size == 0 {
            return Err(UploadError::InvalidParam(
                "buffer size must be positive".into(),
            ));
        }

        if let Some(policy) = &self.put_policy {
            if policy.callback_url().trim().is_empty() {
                return Err(UploadError::RequiredParam("put policy callback url".into()));
            }
            if policy.callback_body().trim().is_empty() {
                return Err(UploadError::RequiredParam("put policy callback body".into()));
            }
        }

        let file_size = validate_file(&file)?;

        Ok(UploadRequest {
            bucket,
            key,
            file,
            file_size,
            content_type,
            verify_md5: self.verify_md5,
            buffer_size: self.buffer_size,
            put_policy: self.put_policy,
            auth_optional_data: self.auth_optional_data,
            on_digest_failure: self.on_digest_failure,
        })
    }
}

fn required(name: &str, value: Option<String>) -> Result<String, UploadError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(UploadError::RequiredParam(name.into())),
    }
}

/// Check that `path` is an existing, readable regular file and return its size
pub(crate) fn validate_file(path: &Path) -> Result<u64, UploadError> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => UploadError::File(format!("{} does not exist", path.display())),
        _ => UploadError::File(format!("cannot stat {}: {}", path.display(), e)),
    })?;

    if !metadata.is_file() {
        return Err(UploadError::File(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    File::open(path)
        .map_err(|e| UploadError::File(format!("{} is not readable: {}", path.display(), e)))?;

    Ok(metadata.len())
}
