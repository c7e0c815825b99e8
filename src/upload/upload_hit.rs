//! Upload-hit (dedup lookup)
//!
//! Asks the store whether it already holds content with the file's
//! fingerprint. A hit completes the logical upload with zero bytes
//! transferred; a miss means the caller should perform the full put.
//!
//! The lookup is signed as a `GET` with an empty content type and MD5 over the
//! resource `/bucket/key`, and carries the fingerprint, the object key and the
//! file size as query parameters.

use super::request::validate_file;
use super::response::{self, RawResponse};
use super::{sealed, ApiContext, ApiKind, ObjectApi, PreparedRequest, UploadError};
use crate::auth::{format_date, AuthorizationContext, HttpMethod};
use crate::fingerprint::ContentFingerprint;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, DATE};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Result of an upload-hit lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitOutcome {
    /// The store already holds identical content
    Hit,
    Miss,
}

impl HitOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, HitOutcome::Hit)
    }
}

/// Validated upload-hit parameters
#[derive(Debug, Clone)]
pub struct UploadHitRequest {
    bucket: String,
    key: String,
    file: PathBuf,
    file_size: u64,
    block_size: usize,
    optional: Option<serde_json::Value>,
}

impl UploadHitRequest {
    /// Validate the destination and file for a lookup
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        file: impl Into<PathBuf>,
        block_size: usize,
    ) -> Result<Self, UploadError> {
        let bucket = bucket.into();
        let key = key.into();
        let file = file.into();

        if bucket.trim().is_empty() {
            return Err(UploadError::RequiredParam("bucket".into()));
        }
        if key.trim().is_empty() {
            return Err(UploadError::RequiredParam("key".into()));
        }
        if block_size == 0 {
            return Err(UploadError::InvalidParam(
                "fingerprint block size must be positive".into(),
            ));
        }
        let file_size = validate_file(&file)?;

        Ok(Self::from_validated(bucket, key, file, file_size, block_size))
    }

    pub(crate) fn from_validated(
        bucket: String,
        key: String,
        file: PathBuf,
        file_size: u64,
        block_size: usize,
    ) -> Self {
        Self {
            bucket,
            key,
            file,
            file_size,
            block_size,
            optional: None,
        }
    }

    /// Extra payload forwarded to remote signing services
    #[must_use]
    pub fn with_optional_data(mut self, optional: Option<serde_json::Value>) -> Self {
        self.optional = optional;
        self
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

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

/// Upload-hit operation
pub struct UploadHit {
    request: UploadHitRequest,
    fingerprint: Option<ContentFingerprint>,
}

impl UploadHit {
    /// Lookup that fingerprints the file while preparing the request
    pub fn new(request: UploadHitRequest) -> Self {
        Self {
            request,
            fingerprint: None,
        }
    }

    /// Lookup with a fingerprint the caller already computed
    pub fn with_fingerprint(request: UploadHitRequest, fingerprint: ContentFingerprint) -> Self {
        Self {
            request,
            fingerprint: Some(fingerprint),
        }
    }

    pub fn request(&self) -> &UploadHitRequest {
        &self.request
    }
}

impl sealed::Sealed for UploadHit {}

#[async_trait]
impl ObjectApi for UploadHit {
    type Output = HitOutcome;

    fn kind(&self) -> ApiKind {
        ApiKind::UploadHit
    }

    fn bucket(&self) -> &str {
        &self.request.bucket
    }

    async fn prepare(&self, ctx: &ApiContext<'_>) -> Result<PreparedRequest, UploadError> {
        let request = &self.request;

        let computed;
        let fingerprint = match &self.fingerprint {
            Some(fingerprint) => fingerprint,
            None => {
                computed =
                    ContentFingerprint::compute_async(request.file.clone(), request.block_size)
                        .await?;
                &computed
            }
        };

        let url = ctx.endpoint.upload_hit_url(
            &request.bucket,
            fingerprint.etag(),
            &request.key,
            fingerprint.file_size(),
        );

        let date = format_date(chrono::Utc::now());
        let auth_ctx =
            AuthorizationContext::new(HttpMethod::Get, &request.bucket, &request.key, "", "", &date)
                .with_optional(request.optional.clone());
        let authorization = ctx.authorizer.authorize(&auth_ctx).await?;

        let mut headers = HeaderMap::new();
        headers.insert(DATE, super::header_value("Date", &date)?);
        headers.insert(
            AUTHORIZATION,
            super::header_value("Authorization", &authorization)?,
        );
        headers.insert(ACCEPT, super::header_value("Accept", "*/*")?);

        tracing::debug!(
            bucket = %request.bucket,
            key = %request.key,
            hash = %fingerprint.etag(),
            file_size = fingerprint.file_size(),
            "Prepared upload-hit lookup"
        );

        Ok(PreparedRequest {
            method: HttpMethod::Get,
            url,
            headers,
            body: None,
            progress: None,
        })
    }

    fn parse_success(&self, _response: RawResponse) -> Result<HitOutcome, UploadError> {
        Ok(HitOutcome::Hit)
    }

    fn parse_error(&self, response: RawResponse) -> Result<HitOutcome, UploadError> {
        if response.status == 404 {
            return Ok(HitOutcome::Miss);
        }
        Err(UploadError::Store(response::parse_error(&response, false)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup() -> (NamedTempFile, UploadHit) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        let request = UploadHitRequest::new("b", "k", file.path(), 1024).unwrap();
        (file, UploadHit::new(request))
    }

    #[test]
    fn test_request_validation() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            UploadHitRequest::new("", "k", file.path(), 1024),
            Err(UploadError::RequiredParam(_))
        ));
        assert!(matches!(
            UploadHitRequest::new("b", "", file.path(), 1024),
            Err(UploadError::RequiredParam(_))
        ));
        assert!(matches!(
            UploadHitRequest::new("b", "k", file.path(), 0),
            Err(UploadError::InvalidParam(_))
        ));
        assert!(matches!(
            UploadHitRequest::new("b", "k", "/definitely/not/here", 1024),
            Err(UploadError::File(_))
        ));
    }

    #[test]
    fn test_success_is_hit() {
        let (_file, op) = lookup();
        let outcome = op
            .parse_success(RawResponse::new(200, HeaderMap::new(), ""))
            .unwrap();
        assert_eq!(outcome, HitOutcome::Hit);
        assert!(outcome.is_hit());
    }

    #[test]
    fn test_not_found_is_miss() {
        let (_file, op) = lookup();
        let outcome = op
            .parse_error(RawResponse::new(404, HeaderMap::new(), r#"{"RetCode":-1}"#))
            .unwrap();
        assert_eq!(outcome, HitOutcome::Miss);
    }

    #[test]
    fn test_other_status_is_store_error() {
        let (_file, op) = lookup();
        let err = op
            .parse_error(RawResponse::new(
                403,
                HeaderMap::new(),
                r#"{"RetCode":1,"ErrMsg":"denied"}"#,
            ))
            .unwrap_err();
        let store = err.store_error().unwrap();
        assert_eq!(store.status, 403);
        assert_eq!(store.message, "denied");
    }
}
