//! Response parsing
//!
//! Converts the transport response into an [`UploadResult`] or an
//! [`ErrorResult`]. The body is read exactly once into a [`RawResponse`];
//! everything after that is pure and works without a network.
//!
//! Parsing branches on whether a put policy was attached:
//!
//! - without a policy the `ETag` header is the result and error bodies are
//!   parsed best-effort
//! - with a policy the body is the callback's own result and is kept verbatim
//!   on both success and error

use super::UploadResult;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the store's session id
pub const SESSION_ID_HEADER: &str = "X-SessionId";

/// Fully read transport response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Read status, headers and the whole body
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Structured store error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    /// HTTP status code
    #[serde(rename = "ResponseCode")]
    pub status: u16,
    /// Store return code, 0 on success
    #[serde(rename = "RetCode")]
    pub ret_code: i64,
    #[serde(rename = "ErrMsg")]
    pub message: String,
    #[serde(rename = "X-SessionId")]
    pub session_id: Option<String>,
    /// Raw callback result, present when a put policy was set
    #[serde(rename = "callbackRet")]
    pub callback_ret: Option<String>,
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} (RetCode {})", self.status, self.ret_code)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(session) = &self.session_id {
            write!(f, " [session {}]", session)?;
        }
        Ok(())
    }
}

/// Error document as the store sends it; every field is optional
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "RetCode", default)]
    ret_code: Option<i64>,
    #[serde(rename = "ErrMsg", default)]
    err_msg: Option<String>,
    #[serde(rename = "SessionId", default)]
    session_id: Option<String>,
}

impl ErrorBody {
    /// Best-effort parse; malformed or empty bodies yield the defaults
    fn parse(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_default()
    }
}

/// Remove every quote character from an ETag
pub fn strip_quotes(etag: &str) -> String {
    etag.replace('"', "")
}

/// Interpret a 2xx put response
///
/// With a policy, a body that is a JSON object carrying a non-zero `RetCode`
/// means the callback failed and is reported as an error.
pub fn parse_put_success(
    response: &RawResponse,
    has_policy: bool,
    bytes_sent: u64,
) -> Result<UploadResult, ErrorResult> {
    let etag = response.header("ETag").map(strip_quotes);

    if !has_policy {
        return Ok(UploadResult {
            etag,
            callback_ret: None,
            bytes_sent,
        });
    }

    let callback_ret = response.text();
    let body = ErrorBody::parse(&response.body);
    if let Some(code) = body.ret_code.filter(|code| *code != 0) {
        return Err(ErrorResult {
            status: response.status,
            ret_code: code,
            message: body.err_msg.unwrap_or_default(),
            session_id: session_id(response, body.session_id),
            callback_ret: Some(callback_ret),
        });
    }

    Ok(UploadResult {
        etag,
        callback_ret: Some(callback_ret),
        bytes_sent,
    })
}

/// Interpret a non-2xx response
pub fn parse_error(response: &RawResponse, has_policy: bool) -> ErrorResult {
    let body = ErrorBody::parse(&response.body);
    ErrorResult {
        status: response.status,
        ret_code: body.ret_code.unwrap_or_default(),
        message: body.err_msg.unwrap_or_default(),
        session_id: session_id(response, body.session_id),
        callback_ret: has_policy.then(|| response.text()),
    }
}

fn session_id(response: &RawResponse, from_body: Option<String>) -> Option<String> {
    response
        .header(SESSION_ID_HEADER)
        .map(str::to_string)
        .or(from_body)
}
