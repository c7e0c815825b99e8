//! Store credentials
//!
//! # Example
//!
//! ```
//! use ufile_uploadr::auth::Credentials;
//!
//! let creds = Credentials::new("public-key", "private-key");
//! assert_eq!(creds.public_key(), "public-key");
//! assert!(!format!("{:?}", creds).contains("private-key"));
//! ```

use super::AuthError;
use crate::config::StoreConfig;
use std::fmt;

/// Environment variable holding the public key
pub const PUBLIC_KEY_ENV: &str = "UFILE_PUBLIC_KEY";

/// Environment variable holding the private key
pub const PRIVATE_KEY_ENV: &str = "UFILE_PRIVATE_KEY";

/// Public/private key pair for request signing
#[derive(Clone)]
pub struct Credentials {
    public_key: String,
    private_key: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Both halves present and non-empty
    pub fn is_complete(&self) -> bool {
        !self.public_key.is_empty() && !self.private_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Factory methods for loading credentials
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Load credentials from `UFILE_PUBLIC_KEY` / `UFILE_PRIVATE_KEY`
    pub fn from_env() -> Result<Credentials, AuthError> {
        let public_key = env_key(PUBLIC_KEY_ENV)?;
        let private_key = env_key(PRIVATE_KEY_ENV)?;

        Ok(Credentials::new(public_key, private_key))
    }

    /// The configured key pair, or the environment when the configuration
    /// names neither key
    pub fn from_config_or_env(config: &StoreConfig) -> Result<Credentials, AuthError> {
        if !is_set(&config.public_key) && !is_set(&config.private_key) {
            tracing::debug!(
                "No keys in configuration, reading {} and {}",
                PUBLIC_KEY_ENV,
                PRIVATE_KEY_ENV
            );
            return Self::from_env();
        }
        Self::from_config(config)
    }

    /// Load credentials from the `store` section of the configuration
    pub fn from_config(config: &StoreConfig) -> Result<Credentials, AuthError> {
        let public_key = config
            .public_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::MissingCredentials("public_key not set in config".into()))?;

        let private_key = config
            .private_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::MissingCredentials("private_key not set in config".into()))?;

        Ok(Credentials::new(public_key, private_key))
    }
}

fn is_set(key: &Option<String>) -> bool {
    key.as_deref().is_some_and(|k| !k.is_empty())
}

fn env_key(name: &str) -> Result<String, AuthError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::MissingCredentials(format!("{} not set", name)))
}
