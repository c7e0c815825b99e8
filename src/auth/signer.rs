//! Local request signer
//!
//! Signs object requests with a locally held key pair. The string to sign is
//! assembled in a fixed order; the server rebuilds the same string, so the
//! order is part of the wire contract:
//!
//! ```text
//! METHOD\n
//! CONTENT-MD5\n
//! CONTENT-TYPE\n
//! DATE\n
//! /BUCKET/KEY[POLICY-TOKEN]
//! ```
//!
//! The signature is `base64(HMAC-SHA1(private_key, string_to_sign))` and the
//! header value is `UCloud {public_key}:{signature}`, with `:{policy_token}`
//! appended when a callback policy is attached.

use super::{AuthError, AuthorizationContext, Credentials, ObjectAuthorizer};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Authorization scheme prefix
const SCHEME: &str = "UCloud";

/// Signs requests with a locally held key pair
#[derive(Debug, Clone)]
pub struct LocalAuthorizer {
    credentials: Credentials,
}

impl LocalAuthorizer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Build the string to sign for `ctx`
    pub fn string_to_sign(ctx: &AuthorizationContext) -> String {
        let mut s = String::with_capacity(
            ctx.content_md5.len() + ctx.content_type.len() + ctx.bucket.len() + ctx.key.len() + 64,
        );
        s.push_str(ctx.method.as_str());
        s.push('\n');
        s.push_str(&ctx.content_md5);
        s.push('\n');
        s.push_str(&ctx.content_type);
        s.push('\n');
        s.push_str(&ctx.date);
        s.push('\n');
        s.push('/');
        s.push_str(&ctx.bucket);
        s.push('/');
        s.push_str(&ctx.key);
        if let Some(policy) = &ctx.put_policy {
            s.push_str(policy);
        }
        s
    }

    /// Produce the `Authorization` header value for `ctx`
    ///
    /// Pure function of `ctx` and the held credentials.
    pub fn sign(&self, ctx: &AuthorizationContext) -> Result<String, AuthError> {
        if !self.credentials.is_complete() {
            return Err(AuthError::MissingCredentials(
                "public and private key are required for local signing".into(),
            ));
        }

        let signature = self.signature(&Self::string_to_sign(ctx));

        Ok(match &ctx.put_policy {
            Some(policy) => format!(
                "{} {}:{}:{}",
                SCHEME,
                self.credentials.public_key(),
                signature,
                policy
            ),
            None => format!("{} {}:{}", SCHEME, self.credentials.public_key(), signature),
        })
    }

    fn signature(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(self.credentials.private_key().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl ObjectAuthorizer for LocalAuthorizer {
    async fn authorize(&self, ctx: &AuthorizationContext) -> Result<String, AuthError> {
        let authorization = self.sign(ctx)?;
        tracing::debug!(
            method = %ctx.method,
            bucket = %ctx.bucket,
            key = %ctx.key,
            has_policy = ctx.put_policy.is_some(),
            "Signed object request"
        );
        Ok(authorization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HttpMethod;

    const DATE: &str = "Tue, 05 Mar 2024 07:08:09 GMT";

    fn put_context() -> AuthorizationContext {
        AuthorizationContext::new(
            HttpMethod::Put,
            "demo-bucket",
            "photos/cat.jpg",
            "text/plain",
            "0123456789abcdef0123456789abcdef",
            DATE,
        )
    }

    fn authorizer() -> LocalAuthorizer {
        LocalAuthorizer::new(Credentials::new("public-key", "private-key"))
    }

    #[test]
    fn test_string_to_sign_field_order() {
        assert_eq!(
            LocalAuthorizer::string_to_sign(&put_context()),
            "PUT\n0123456789abcdef0123456789abcdef\ntext/plain\nTue, 05 Mar 2024 07:08:09 GMT\n/demo-bucket/photos/cat.jpg"
        );
    }

    #[test]
    fn test_string_to_sign_empty_md5_and_type() {
        let ctx = AuthorizationContext::new(HttpMethod::Get, "b", "k", "", "", DATE);
        assert_eq!(
            LocalAuthorizer::string_to_sign(&ctx),
            "GET\n\n\nTue, 05 Mar 2024 07:08:09 GMT\n/b/k"
        );
    }

    #[test]
    fn test_policy_token_follows_resource() {
        let ctx = put_context().with_put_policy(Some("POLICY".into()));
        assert!(LocalAuthorizer::string_to_sign(&ctx).ends_with("/demo-bucket/photos/cat.jpgPOLICY"));
    }

    #[test]
    fn test_sign_known_vector() {
        let token = authorizer().sign(&put_context()).unwrap();
        assert_eq!(token, "UCloud public-key:g2Nlw+DCl+cKMmZKMudzPkQjy7Y=");
    }

    #[test]
    fn test_sign_lookup_vector() {
        let ctx = AuthorizationContext::new(HttpMethod::Get, "demo-bucket", "photos/cat.jpg", "", "", DATE);
        let token = authorizer().sign(&ctx).unwrap();
        assert_eq!(token, "UCloud public-key:Wn9eUt3LwvX2GNoX+oMxHq398M0=");
    }

    #[test]
    fn test_sign_with_policy_vector() {
        let policy = "eyJjYWxsYmFja1VybCI6Imh0dHBzOi8vY2IuZXhhbXBsZS5jb20vbm90aWZ5IiwiY2FsbGJhY2tCb2R5Ijoia2V5PSR7a2V5fSJ9";
        let ctx = put_context().with_put_policy(Some(policy.into()));
        let token = authorizer().sign(&ctx).unwrap();
        assert_eq!(
            token,
            format!("UCloud public-key:b0azY87x633bjQqXIGR6PqyBKr8=:{}", policy)
        );
    }

    #[test]
    fn test_optional_payload_not_signed() {
        let plain = authorizer().sign(&put_context()).unwrap();
        let extended = authorizer()
            .sign(&put_context().with_optional(Some(serde_json::json!({"tenant": "a"}))))
            .unwrap();
        assert_eq!(plain, extended);
    }

    #[test]
    fn test_missing_credentials() {
        let signer = LocalAuthorizer::new(Credentials::new("public-key", ""));
        assert!(matches!(
            signer.sign(&put_context()),
            Err(AuthError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = authorizer();
        assert_eq!(
            signer.sign(&put_context()).unwrap(),
            signer.sign(&put_context()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_authorize_delegates_to_sign() {
        let signer = authorizer();
        let token = signer.authorize(&put_context()).await.unwrap();
        assert_eq!(token, signer.sign(&put_context()).unwrap());
    }
}
