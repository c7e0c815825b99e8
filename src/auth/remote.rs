//! Remote signing service
//!
//! Forwards the [`AuthorizationContext`] as JSON to a trusted signing service
//! and uses the `authorization` value it returns. The service holds the
//! private key, so clients only ever see signed tokens. The context's
//! `optional` payload is forwarded untouched, letting the service apply its own
//! access rules before signing.
//!
//! Request: `POST {url}` with the serialized context as body.
//! Response: `{"authorization": "UCloud ..."}` (the key is matched
//! case-insensitively as `authorization` or `Authorization`).
//!
//! # Example
//!
//! ```no_run
//! use ufile_uploadr::auth::{AuthorizationContext, HttpMethod, ObjectAuthorizer, RemoteAuthorizer};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authorizer = RemoteAuthorizer::new("https://signer.internal/ufile", Duration::from_secs(5))?;
//! let ctx = AuthorizationContext::new(HttpMethod::Put, "bucket", "key", "text/plain", "", "date");
//! let token = authorizer.authorize(&ctx).await?;
//! # Ok(())
//! # }
//! ```

use super::{AuthError, AuthorizationContext, ObjectAuthorizer};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Default timeout for signing requests (5 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct SigningResponse {
    #[serde(alias = "Authorization")]
    authorization: String,
}

/// Delegates request signing to a remote service
#[derive(Debug, Clone)]
pub struct RemoteAuthorizer {
    url: String,
    client: reqwest::Client,
}

impl RemoteAuthorizer {
    /// Create a remote authorizer posting to `url`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Remote(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ObjectAuthorizer for RemoteAuthorizer {
    #[tracing::instrument(
        name = "auth.remote_sign",
        skip(self, ctx),
        fields(
            auth.url = %self.url,
            ufile.bucket = %ctx.bucket,
            ufile.key = %ctx.key,
            http.method = %ctx.method
        ),
        err
    )]
    async fn authorize(&self, ctx: &AuthorizationContext) -> Result<String, AuthError> {
        let response = self
            .client
            .post(&self.url)
            .json(ctx)
            .send()
            .await
            .map_err(|e| AuthError::Remote(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Remote(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: SigningResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        if body.authorization.is_empty() {
            return Err(AuthError::InvalidResponse(
                "signing service returned an empty authorization".into(),
            ));
        }

        Ok(body.authorization)
    }
}
