//! Store client
//!
//! [`UfileClient`] executes object operations against the store. It owns the
//! HTTP transport, the endpoint and the shared authorizer, and holds no
//! per-upload state: clones are cheap and may run uploads concurrently.
//!
//! # Execution modes
//!
//! | Method | Runs on | Result delivered |
//! |--------|---------|------------------|
//! | [`UfileClient::put_file`] | the awaiting task | returned |
//! | [`UfileClient::put_file_blocking`] | the calling thread | returned |
//! | [`UfileClient::put_file_async`] | a spawned tokio task | `on_complete`, exactly once |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ufile_uploadr::auth::{Credentials, LocalAuthorizer};
//! use ufile_uploadr::store::{Endpoint, UfileClient};
//! use ufile_uploadr::upload::UploadRequestBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authorizer = LocalAuthorizer::new(Credentials::new("public", "private"));
//! let client = UfileClient::new(Endpoint::new("https", "cn-bj.ufileos.com"), Arc::new(authorizer))?;
//!
//! let request = UploadRequestBuilder::new()
//!     .from_file("report.pdf", "application/pdf")
//!     .name_as("reports/2024.pdf")
//!     .to_bucket("demo-bucket")
//!     .build()?;
//! let result = client.put_file(request, None).await?;
//! println!("ETag: {:?}", result.etag);
//! # Ok(())
//! # }
//! ```

use crate::auth::{CredentialsProvider, LocalAuthorizer, ObjectAuthorizer, RemoteAuthorizer};
use crate::config::Config;
use crate::fingerprint::ContentFingerprint;
use crate::metrics;
use crate::upload::{
    ApiContext, HitOutcome, ObjectApi, ProgressObserver, PutFile, RawResponse, UploadError,
    UploadHit, UploadHitRequest, UploadOutcome, UploadRequest, UploadResult,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

mod endpoint;

pub use endpoint::Endpoint;

/// Builds the HTTP transport
///
/// A connection pool is tied to the runtime it was first used on, so the
/// blocking mode asks for a fresh client on its private runtime.
pub type TransportFactory = Arc<dyn Fn() -> reqwest::Result<reqwest::Client> + Send + Sync>;

/// Client for object operations
#[derive(Clone)]
pub struct UfileClient {
    endpoint: Endpoint,
    http: reqwest::Client,
    transport: TransportFactory,
    authorizer: Arc<dyn ObjectAuthorizer>,
}

impl UfileClient {
    /// Create a client with a default HTTP transport
    pub fn new(
        endpoint: Endpoint,
        authorizer: Arc<dyn ObjectAuthorizer>,
    ) -> Result<Self, UploadError> {
        Self::with_transport(endpoint, authorizer, http_client)
    }

    /// Create a client on a caller-configured transport
    ///
    /// `make_client` is called once here and once per blocking upload, so
    /// proxies, timeouts and default headers apply in every execution mode.
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use ufile_uploadr::auth::{Credentials, LocalAuthorizer};
    /// # use ufile_uploadr::store::{Endpoint, UfileClient};
    /// let client = UfileClient::with_transport(
    ///     Endpoint::new("https", "cn-bj.ufileos.com"),
    ///     Arc::new(LocalAuthorizer::new(Credentials::new("public", "private"))),
    ///     || reqwest::Client::builder().timeout(Duration::from_secs(30)).build(),
    /// )?;
    /// # Ok::<(), ufile_uploadr::UploadError>(())
    /// ```
    pub fn with_transport<F>(
        endpoint: Endpoint,
        authorizer: Arc<dyn ObjectAuthorizer>,
        make_client: F,
    ) -> Result<Self, UploadError>
    where
        F: Fn() -> reqwest::Result<reqwest::Client> + Send + Sync + 'static,
    {
        let http = make_client()?;
        Ok(Self {
            endpoint,
            http,
            transport: Arc::new(make_client),
            authorizer,
        })
    }

    /// Create a client from configuration
    ///
    /// Uses the remote signing service when `store.remote_auth` is set, the
    /// configured key pair otherwise, and `UFILE_PUBLIC_KEY` /
    /// `UFILE_PRIVATE_KEY` when the configuration names no keys.
    pub fn from_config(config: &Config) -> Result<Self, UploadError> {
        let authorizer: Arc<dyn ObjectAuthorizer> = match &config.store.remote_auth {
            Some(remote) => Arc::new(RemoteAuthorizer::new(
                remote.url.as_str(),
                Duration::from_secs(remote.timeout_seconds),
            )?),
            None => Arc::new(LocalAuthorizer::new(CredentialsProvider::from_config_or_env(
                &config.store,
            )?)),
        };
        Self::new(Endpoint::from_config(&config.store), authorizer)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Run one operation: prepare, send, read, parse
    pub async fn execute<A: ObjectApi>(&self, op: A) -> Result<A::Output, UploadError> {
        let kind = op.kind();
        let start = Instant::now();
        let result = self.send(&op).await;
        metrics::record_operation_duration(op.bucket(), kind, start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::record_error(kind, e.kind());
        }
        result
    }

    async fn send<A: ObjectApi>(&self, op: &A) -> Result<A::Output, UploadError> {
        let ctx = ApiContext {
            endpoint: &self.endpoint,
            authorizer: self.authorizer.as_ref(),
        };
        let prepared = op.prepare(&ctx).await?;

        let mut request = self
            .http
            .request(prepared.method.into(), prepared.url.as_str())
            .headers(prepared.headers);
        if let Some(body) = prepared.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let raw = RawResponse::read(response).await?;

        if let Some(tracker) = &prepared.progress {
            tracker.complete();
        }

        tracing::debug!(
            operation = %op.kind(),
            status = raw.status,
            "Store responded"
        );

        if raw.is_success() {
            op.parse_success(raw)
        } else {
            op.parse_error(raw)
        }
    }

    /// Upload a file and wait for the result
    #[tracing::instrument(
        name = "ufile.put_file",
        skip(self, request, progress),
        fields(
            ufile.bucket = %request.bucket(),
            ufile.key = %request.key(),
            http.method = "PUT",
            upload.bytes = request.file_size(),
            ufile.etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn put_file(
        &self,
        request: UploadRequest,
        progress: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<UploadResult, UploadError> {
        let bucket = request.bucket().to_string();
        let key = request.key().to_string();
        let span = tracing::Span::current();

        match self.execute(PutFile::new(request, progress)).await {
            Ok(result) => {
                if let Some(etag) = &result.etag {
                    span.record("ufile.etag", etag.as_str());
                }
                metrics::record_upload_success(&bucket, result.bytes_sent);
                tracing::info!(
                    bucket = %bucket,
                    key = %key,
                    bytes = result.bytes_sent,
                    etag = ?result.etag,
                    "Upload completed"
                );
                Ok(result)
            }
            Err(e) => {
                if let Some(store) = e.store_error() {
                    span.record("http.status_code", store.status);
                }
                metrics::record_upload_failure(&bucket);
                Err(e)
            }
        }
    }

    /// Upload a file on the calling thread
    ///
    /// Drives the upload on a private current-thread runtime with a transport
    /// freshly built by the client's factory. Must not be called from inside a
    /// tokio runtime.
    pub fn put_file_blocking(
        &self,
        request: UploadRequest,
        progress: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<UploadResult, UploadError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = Self {
            http: (self.transport)()?,
            ..self.clone()
        };
        runtime.block_on(client.put_file(request, progress))
    }

    /// Upload a file in the background
    ///
    /// `on_complete` runs exactly once on the runtime, after the final progress
    /// notification. A panicking upload task is reported as
    /// [`UploadError::Task`].
    pub fn put_file_async<F>(
        &self,
        request: UploadRequest,
        progress: Option<Arc<dyn ProgressObserver>>,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<UploadResult, UploadError>) + Send + 'static,
    {
        let client = self.clone();
        let upload = tokio::spawn(async move { client.put_file(request, progress).await });
        tokio::spawn(async move {
            let result = match upload.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Upload task failed");
                    Err(UploadError::Task(e.to_string()))
                }
            };
            on_complete(result);
        })
    }

    /// Ask the store whether it already holds the file's content
    #[tracing::instrument(
        name = "ufile.upload_hit",
        skip(self, request),
        fields(
            ufile.bucket = %request.bucket(),
            ufile.key = %request.key(),
            http.method = "GET",
            upload.bytes = request.file_size()
        ),
        err
    )]
    pub async fn upload_hit(&self, request: UploadHitRequest) -> Result<HitOutcome, UploadError> {
        let bucket = request.bucket().to_string();
        let outcome = self.execute(UploadHit::new(request)).await?;
        metrics::record_upload_hit(&bucket, outcome);
        tracing::info!(bucket = %bucket, hit = outcome.is_hit(), "Upload-hit lookup completed");
        Ok(outcome)
    }

    /// Look the file up first and upload it only when the store misses
    ///
    /// Lookup failures are returned as-is; nothing falls back to a put.
    pub async fn put_file_with_hit(
        &self,
        request: UploadRequest,
        block_size: usize,
        progress: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<UploadOutcome, UploadError> {
        let hit_request = request.hit_request(block_size)?;
        let fingerprint =
            ContentFingerprint::compute_async(hit_request.file().to_path_buf(), block_size).await?;
        let etag = fingerprint.etag().to_string();
        let bucket = request.bucket().to_string();

        let outcome = self
            .execute(UploadHit::with_fingerprint(hit_request, fingerprint))
            .await?;
        metrics::record_upload_hit(&bucket, outcome);

        match outcome {
            HitOutcome::Hit => {
                metrics::record_upload_deduplicated(&bucket);
                tracing::info!(
                    bucket = %bucket,
                    key = %request.key(),
                    etag = %etag,
                    "Store already holds content; skipping upload"
                );
                Ok(UploadOutcome::Deduplicated { etag })
            }
            HitOutcome::Miss => self
                .put_file(request, progress)
                .await
                .map(UploadOutcome::Uploaded),
        }
    }
}

impl std::fmt::Debug for UfileClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UfileClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("ufile-uploadr/", env!("CARGO_PKG_VERSION")))
        .build()
}
