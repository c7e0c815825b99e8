//! Whole-file integrity digest
//!
//! When verification is on, the file is streamed once through MD5 and the
//! lowercase hex digest is sent as `Content-MD5` and covered by the signature.
//! A failed digest is never silently dropped: [`resolve`] applies an explicit
//! [`DigestFailurePolicy`].

use super::UploadError;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// What to do when the integrity digest cannot be computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestFailurePolicy {
    /// Fail the upload
    #[default]
    Abort,
    /// Upload without `Content-MD5` and log a warning
    ProceedUnverified,
}

/// Integrity digest decided for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMd5 {
    /// Lowercase hex MD5 of the whole file
    Verified(String),
    /// Verification was turned off by the caller
    Disabled,
    /// Verification was requested but the digest failed and the policy allowed
    /// the upload to continue
    Unverified,
}

impl ContentMd5 {
    /// Value for the `Content-MD5` header, if any
    pub fn header_value(&self) -> Option<&str> {
        match self {
            ContentMd5::Verified(hex) => Some(hex.as_str()),
            ContentMd5::Disabled | ContentMd5::Unverified => None,
        }
    }

    /// Value covered by the signature (empty when absent)
    pub fn signed_value(&self) -> &str {
        self.header_value().unwrap_or("")
    }
}

/// MD5 everything `reader` yields, `buffer_size` bytes at a time
pub fn md5_hex<R: Read>(mut reader: R, buffer_size: usize) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// MD5 of the file at `path`
pub fn file_md5<P: AsRef<Path>>(path: P, buffer_size: usize) -> io::Result<String> {
    md5_hex(File::open(path)?, buffer_size)
}

/// MD5 of the file at `path`, computed on tokio's blocking pool
pub async fn file_md5_async(path: PathBuf, buffer_size: usize) -> io::Result<String> {
    tokio::task::spawn_blocking(move || file_md5(path, buffer_size))
        .await
        .map_err(io::Error::other)?
}

/// Turn a digest attempt into the digest to use, honouring `policy`
pub fn resolve(
    digest: io::Result<String>,
    policy: DigestFailurePolicy,
) -> Result<ContentMd5, UploadError> {
    match (digest, policy) {
        (Ok(hex), _) => Ok(ContentMd5::Verified(hex)),
        (Err(e), DigestFailurePolicy::Abort) => Err(UploadError::IntegrityDigest(e)),
        (Err(e), DigestFailurePolicy::ProceedUnverified) => {
            tracing::warn!(
                error = %e,
                "Content-MD5 could not be computed; uploading without integrity verification"
            );
            Ok(ContentMd5::Unverified)
        }
    }
}
