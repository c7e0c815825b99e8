//! Put-file operation
//!
//! Uploads one file in a single `PUT`. Preparation hashes the file when
//! verification is on, signs the request and opens the file as a chunked body
//! stream; the transfer itself is driven by the executor.

use super::integrity::{self, ContentMd5};
use super::progress::{chunked, ProgressObserver, ProgressStream, ProgressTracker};
use super::request::UploadRequest;
use super::response::{self, RawResponse};
use super::{sealed, ApiContext, ApiKind, ObjectApi, PreparedRequest, UploadError, UploadResult};
use crate::auth::{format_date, AuthorizationContext, HttpMethod};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Single-request file upload
///
/// Consumed by execution, so one value drives at most one transfer.
pub struct PutFile {
    request: UploadRequest,
    progress: Option<Arc<dyn ProgressObserver>>,
}

impl PutFile {
    pub fn new(request: UploadRequest, progress: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self { request, progress }
    }

    pub fn request(&self) -> &UploadRequest {
        &self.request
    }

    async fn content_md5(&self) -> Result<ContentMd5, UploadError> {
        let request = &self.request;
        if !request.verify_md5() {
            return Ok(ContentMd5::Disabled);
        }
        let digest =
            integrity::file_md5_async(request.file().to_path_buf(), request.buffer_size()).await;
        integrity::resolve(digest, request.on_digest_failure())
    }

    /// Sign and open the body once the integrity digest is settled
    async fn prepare_with_digest(
        &self,
        ctx: &ApiContext<'_>,
        content_md5: ContentMd5,
    ) -> Result<PreparedRequest, UploadError> {
        let request = &self.request;

        let policy_token = request
            .put_policy()
            .map(|policy| policy.to_token())
            .transpose()?;

        let content_type = request.content_type().to_string();
        let date = format_date(chrono::Utc::now());
        let auth_ctx = AuthorizationContext::new(
            HttpMethod::Put,
            request.bucket(),
            request.key(),
            &content_type,
            content_md5.signed_value(),
            &date,
        )
        .with_put_policy(policy_token)
        .with_optional(request.auth_optional_data().cloned());
        let authorization = ctx.authorizer.authorize(&auth_ctx).await?;

        let size = request.file_size();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, super::header_value("Content-Type", &content_type)?);
        headers.insert(CONTENT_LENGTH, super::header_value("Content-Length", &size.to_string())?);
        headers.insert(DATE, super::header_value("Date", &date)?);
        headers.insert(ACCEPT, super::header_value("Accept", "*/*")?);
        headers.insert(
            AUTHORIZATION,
            super::header_value("Authorization", &authorization)?,
        );
        if let Some(md5) = content_md5.header_value() {
            headers.insert("content-md5", super::header_value("Content-MD5", md5)?);
        }

        // Body length must match Content-Length even if the file grew
        let file = tokio::fs::File::open(request.file()).await?.take(size);
        let tracker = Arc::new(ProgressTracker::new(size, self.progress.clone()));
        let stream = ProgressStream::new(chunked(file, request.buffer_size()), tracker.clone());

        tracing::debug!(
            bucket = %request.bucket(),
            key = %request.key(),
            bytes = size,
            verified = content_md5.header_value().is_some(),
            callback = request.put_policy().is_some(),
            "Prepared put-file request"
        );

        Ok(PreparedRequest {
            method: HttpMethod::Put,
            url: ctx.endpoint.object_url(request.bucket(), request.key()),
            headers,
            body: Some(reqwest::Body::wrap_stream(stream)),
            progress: Some(tracker),
        })
    }
}

impl sealed::Sealed for PutFile {}

#[async_trait]
impl ObjectApi for PutFile {
    type Output = UploadResult;

    fn kind(&self) -> ApiKind {
        ApiKind::PutFile
    }

    fn bucket(&self) -> &str {
        self.request.bucket()
    }

    async fn prepare(&self, ctx: &ApiContext<'_>) -> Result<PreparedRequest, UploadError> {
        let content_md5 = self.content_md5().await?;
        self.prepare_with_digest(ctx, content_md5).await
    }

    fn parse_success(&self, response: RawResponse) -> Result<UploadResult, UploadError> {
        let has_policy = self.request.put_policy().is_some();
        response::parse_put_success(&response, has_policy, self.request.file_size())
            .map_err(UploadError::Store)
    }

    fn parse_error(&self, response: RawResponse) -> Result<UploadResult, UploadError> {
        let has_policy = self.request.put_policy().is_some();
        Err(UploadError::Store(response::parse_error(&response, has_policy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credentials, LocalAuthorizer};
    use crate::store::{Endpoint, UfileClient};
    use crate::upload::{DigestFailurePolicy, PutPolicy, UploadRequestBuilder};
    use reqwest::header::HeaderValue;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Put whose digest read fails; the request's policy decides what follows
    struct FailingDigest(PutFile);

    impl sealed::Sealed for FailingDigest {}

    #[async_trait]
    impl ObjectApi for FailingDigest {
        type Output = UploadResult;

        fn kind(&self) -> ApiKind {
            self.0.kind()
        }

        fn bucket(&self) -> &str {
            self.0.bucket()
        }

        async fn prepare(&self, ctx: &ApiContext<'_>) -> Result<PreparedRequest, UploadError> {
            let failed = std::io::Error::other("device read error");
            let md5 = integrity::resolve(Err(failed), self.0.request.on_digest_failure())?;
            self.0.prepare_with_digest(ctx, md5).await
        }

        fn parse_success(&self, response: RawResponse) -> Result<UploadResult, UploadError> {
            self.0.parse_success(response)
        }

        fn parse_error(&self, response: RawResponse) -> Result<UploadResult, UploadError> {
            self.0.parse_error(response)
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("pub", "priv")
    }

    fn mock_client(server: &MockServer) -> UfileClient {
        UfileClient::new(
            Endpoint::with_override(server.uri()),
            Arc::new(LocalAuthorizer::new(credentials())),
        )
        .unwrap()
    }

    fn payload_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        file.flush().unwrap();
        file
    }

    fn put(policy: Option<PutPolicy>) -> (NamedTempFile, PutFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        let mut builder = UploadRequestBuilder::new()
            .from_file(file.path(), "application/octet-stream")
            .name_as("k")
            .to_bucket("b");
        if let Some(policy) = policy {
            builder = builder.put_policy(policy);
        }
        let request = builder.build().unwrap();
        (file, PutFile::new(request, None))
    }

    #[test]
    fn test_kind_and_bucket() {
        let (_file, op) = put(None);
        assert_eq!(op.kind(), ApiKind::PutFile);
        assert_eq!(op.bucket(), "b");
    }

    #[test]
    fn test_parse_success_reports_file_size() {
        let (_file, op) = put(None);
        let mut headers = HeaderMap::new();
        headers.insert("ETag", HeaderValue::from_static("\"abc123\""));
        let result = op
            .parse_success(RawResponse::new(200, headers, ""))
            .unwrap();
        assert_eq!(result.etag.as_deref(), Some("abc123"));
        assert_eq!(result.bytes_sent, 7);
    }

    #[test]
    fn test_parse_error_keeps_callback_body() {
        let (_file, op) = put(Some(PutPolicy::new("https://cb.example.com", "k=${key}")));
        let err = op
            .parse_error(RawResponse::new(400, HeaderMap::new(), "callback refused"))
            .unwrap_err();
        let store = err.store_error().unwrap();
        assert_eq!(store.status, 400);
        assert_eq!(store.callback_ret.as_deref(), Some("callback refused"));
    }

    #[tokio::test]
    async fn test_unverified_digest_uploads_without_content_md5() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/b/k"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"unverified\""))
            .expect(1)
            .mount(&server)
            .await;

        let file = payload_file();
        let request = UploadRequestBuilder::new()
            .from_file(file.path(), "application/octet-stream")
            .name_as("k")
            .to_bucket("b")
            .on_digest_failure(DigestFailurePolicy::ProceedUnverified)
            .build()
            .unwrap();

        let result = mock_client(&server)
            .execute(FailingDigest(PutFile::new(request, None)))
            .await
            .unwrap();
        assert_eq!(result.etag.as_deref(), Some("unverified"));
        assert_eq!(result.bytes_sent, 7);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        let sent = &received[0];
        assert!(sent.headers.get("content-md5").is_none());
        assert_eq!(sent.body, b"payload");

        // Signed with an empty MD5 line
        let date = sent.headers.get("date").unwrap().to_str().unwrap();
        let ctx = AuthorizationContext::new(
            HttpMethod::Put,
            "b",
            "k",
            "application/octet-stream",
            "",
            date,
        );
        let expected = LocalAuthorizer::new(credentials()).sign(&ctx).unwrap();
        assert_eq!(
            sent.headers.get("authorization").unwrap().to_str().unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_failed_digest_aborts_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let file = payload_file();
        let request = UploadRequestBuilder::new()
            .from_file(file.path(), "application/octet-stream")
            .name_as("k")
            .to_bucket("b")
            .build()
            .unwrap();

        let err = mock_client(&server)
            .execute(FailingDigest(PutFile::new(request, None)))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::IntegrityDigest(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
