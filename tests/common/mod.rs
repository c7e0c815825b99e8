//! Shared helpers for store integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use ufile_uploadr::auth::{AuthorizationContext, Credentials, HttpMethod, LocalAuthorizer};
use ufile_uploadr::store::{Endpoint, UfileClient};
use wiremock::{MockServer, Request};

pub const PUBLIC_KEY: &str = "test-public";
pub const PRIVATE_KEY: &str = "test-private";
pub const BUCKET: &str = "test-bucket";

pub fn credentials() -> Credentials {
    Credentials::new(PUBLIC_KEY, PRIVATE_KEY)
}

/// Client addressing the mock server path-style
pub fn client(server: &MockServer) -> UfileClient {
    UfileClient::new(
        Endpoint::with_override(server.uri()),
        Arc::new(LocalAuthorizer::new(credentials())),
    )
    .unwrap()
}

/// Client on a caller-built transport
pub fn client_with_transport<F>(server: &MockServer, make_client: F) -> UfileClient
where
    F: Fn() -> reqwest::Result<reqwest::Client> + Send + Sync + 'static,
{
    UfileClient::with_transport(
        Endpoint::with_override(server.uri()),
        Arc::new(LocalAuthorizer::new(credentials())),
        make_client,
    )
    .unwrap()
}

pub fn temp_file(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

/// Deterministic, non-repeating-looking test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

pub fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Re-sign what the store received and compare with its Authorization header
pub fn assert_signed(
    request: &Request,
    method: HttpMethod,
    key: &str,
    content_type: &str,
    content_md5: &str,
    policy: Option<String>,
) {
    let date = header(request, "date").expect("Date header");
    let ctx = AuthorizationContext::new(method, BUCKET, key, content_type, content_md5, date)
        .with_put_policy(policy);
    let expected = LocalAuthorizer::new(credentials()).sign(&ctx).unwrap();
    assert_eq!(header(request, "authorization"), Some(expected.as_str()));
}
