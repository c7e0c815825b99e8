//! Store addressing
//!
//! Objects normally live at `{scheme}://{bucket}.{host}/{key}`. An explicit
//! endpoint switches to path style, `{endpoint}/{bucket}/{key}`, for private
//! deployments and local mock stores.

use crate::config::StoreConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is in object keys; `/` keeps its path meaning
const KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
enum Addressing {
    /// `{scheme}://{bucket}.{host}`
    VirtualHost { scheme: String, host: String },
    /// `{base}/{bucket}`
    Path { base: String },
}

/// Resolves request URLs for a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    addressing: Addressing,
}

impl Endpoint {
    /// Virtual-host addressing under `host`
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            addressing: Addressing::VirtualHost {
                scheme: scheme.into(),
                host: host.into().trim_end_matches('/').to_string(),
            },
        }
    }

    /// Path-style addressing rooted at `base`
    pub fn with_override(base: impl Into<String>) -> Self {
        Self {
            addressing: Addressing::Path {
                base: base.into().trim_end_matches('/').to_string(),
            },
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        match &config.endpoint {
            Some(endpoint) => Self::with_override(endpoint.as_str()),
            None => Self::new(config.scheme.as_str(), config.host.as_str()),
        }
    }

    /// Base URL for `bucket`, without a trailing slash
    pub fn base_url(&self, bucket: &str) -> String {
        match &self.addressing {
            Addressing::VirtualHost { scheme, host } => format!("{}://{}.{}", scheme, bucket, host),
            Addressing::Path { base } => format!("{}/{}", base, bucket),
        }
    }

    /// URL of object `key` in `bucket`
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url(bucket),
            utf8_percent_encode(key, KEY)
        )
    }

    /// URL of the upload-hit lookup for `file_name` with fingerprint `hash`
    pub fn upload_hit_url(&self, bucket: &str, hash: &str, file_name: &str, file_size: u64) -> String {
        format!(
            "{}/uploadhit?Hash={}&FileName={}&FileSize={}",
            self.base_url(bucket),
            utf8_percent_encode(hash, QUERY_VALUE),
            utf8_percent_encode(file_name, QUERY_VALUE),
            file_size
        )
    }
}
