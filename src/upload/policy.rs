//! Put policy (upload callback)
//!
//! A put policy asks the store to call a downstream service once the object is
//! stored and to return that call's response inline with the upload response.
//! The policy travels as a token: compact JSON, standard base64. The same token
//! is appended to the string to sign and to the `Authorization` header.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Callback policy attached to an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutPolicy {
    callback_url: String,
    /// Body template sent to the callback, e.g. `key=${key}&etag=${etag}`
    callback_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback_method: Option<String>,
}

impl PutPolicy {
    pub fn new(callback_url: impl Into<String>, callback_body: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            callback_body: callback_body.into(),
            callback_host: None,
            callback_method: None,
        }
    }

    /// Override the `Host` header the store sends to the callback
    #[must_use]
    pub fn with_callback_host(mut self, host: impl Into<String>) -> Self {
        self.callback_host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_callback_method(mut self, method: impl Into<String>) -> Self {
        self.callback_method = Some(method.into());
        self
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn callback_body(&self) -> &str {
        &self.callback_body
    }

    /// Encoded policy token
    pub fn to_token(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_minimal() {
        let policy = PutPolicy::new("https://cb.example.com/notify", "key=${key}");
        assert_eq!(
            policy.to_token().unwrap(),
            "eyJjYWxsYmFja1VybCI6Imh0dHBzOi8vY2IuZXhhbXBsZS5jb20vbm90aWZ5IiwiY2FsbGJhY2tCb2R5Ijoia2V5PSR7a2V5fSJ9"
        );
    }

    #[test]
    fn test_token_with_host_and_method() {
        let policy = PutPolicy::new("https://cb.example.com/notify", "key=${key}")
            .with_callback_host("cb.internal")
            .with_callback_method("POST");
        assert_eq!(
            policy.to_token().unwrap(),
            "eyJjYWxsYmFja1VybCI6Imh0dHBzOi8vY2IuZXhhbXBsZS5jb20vbm90aWZ5IiwiY2FsbGJhY2tCb2R5Ijoia2V5PSR7a2V5fSIsImNhbGxiYWNrSG9zdCI6ImNiLmludGVybmFsIiwiY2FsbGJhY2tNZXRob2QiOiJQT1NUIn0="
        );
    }

    #[test]
    fn test_token_round_trips_json() {
        let policy = PutPolicy::new("https://cb.example.com", "a=1").with_callback_method("PUT");
        let decoded = STANDARD.decode(policy.to_token().unwrap()).unwrap();
        let parsed: PutPolicy = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(parsed, policy);
    }
}
