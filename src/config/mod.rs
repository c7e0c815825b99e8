//! Configuration module for UFile Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! # Example
//!
//! ```yaml
//! store:
//!   host: "cn-bj.ufileos.com"
//!   public_key: "${UFILE_PUBLIC_KEY}"
//!   private_key: "${UFILE_PRIVATE_KEY}"
//! upload:
//!   buffer_size: 262144
//!   verify_md5: true
//!   on_digest_failure: abort
//! logging:
//!   level: info
//!   format: json
//! ```

use crate::fingerprint::DEFAULT_BLOCK_SIZE;
use crate::upload::integrity::DigestFailurePolicy;
use crate::upload::DEFAULT_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.store;

        match &store.endpoint {
            Some(endpoint) if !is_valid_http_url(endpoint) => {
                return Err(ConfigError::ValidationError(
                    "Invalid store endpoint: must start with http:// or https://".into(),
                ));
            }
            Some(_) => {}
            None if store.host.trim().is_empty() => {
                return Err(ConfigError::ValidationError(
                    "store.host cannot be empty when no endpoint is set".into(),
                ));
            }
            None => {}
        }

        match store.scheme.as_str() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid scheme '{}': must be 'http' or 'https'",
                    other
                )))
            }
        }

        match &store.remote_auth {
            Some(remote) => {
                if !is_valid_http_url(&remote.url) {
                    return Err(ConfigError::ValidationError(
                        "Invalid remote_auth url: must start with http:// or https://".into(),
                    ));
                }
            }
            // Neither key means the environment supplies them
            None => {
                let public = store.public_key.as_deref().is_some_and(|k| !k.is_empty());
                let private = store.private_key.as_deref().is_some_and(|k| !k.is_empty());
                if public != private {
                    return Err(ConfigError::ValidationError(
                        "public_key and private_key must be set together".into(),
                    ));
                }
            }
        }

        if self.upload.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.buffer_size must be positive".into(),
            ));
        }

        if self.upload.fingerprint_block_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.fingerprint_block_size must be positive".into(),
            ));
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format '{}': must be 'json' or 'pretty'",
                    other
                )))
            }
        }

        Ok(())
    }
}

/// Store addressing and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Regional API host; objects live at `{bucket}.{host}`
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Path-style base URL overriding `{scheme}://{bucket}.{host}`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub remote_auth: Option<RemoteAuthConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            scheme: default_scheme(),
            endpoint: None,
            public_key: None,
            private_key: None,
            remote_auth: None,
        }
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

/// Remote signing service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAuthConfig {
    pub url: String,
    #[serde(default = "default_remote_timeout")]
    pub timeout_seconds: u64,
}

fn default_remote_timeout() -> u64 {
    5
}

/// Upload defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_verify_md5")]
    pub verify_md5: bool,
    #[serde(default)]
    pub on_digest_failure: DigestFailurePolicy,
    #[serde(default = "default_fingerprint_block_size")]
    pub fingerprint_block_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            verify_md5: default_verify_md5(),
            on_digest_failure: DigestFailurePolicy::default(),
            fingerprint_block_size: default_fingerprint_block_size(),
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_verify_md5() -> bool {
    true
}

fn default_fingerprint_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

/// Log output settings for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}
