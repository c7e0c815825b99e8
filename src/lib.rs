//! UFile Uploadr Library
//!
//! Client-side upload pipeline for UFile-style object stores.
//!
//! # Features
//!
//! - **Signed Requests**: HMAC-SHA1 request signing, locally or through a
//!   remote signing service
//! - **Streaming Uploads**: Files are streamed in fixed-size chunks with
//!   progress reporting and optional whole-file `Content-MD5`
//! - **Upload Callbacks**: Put policies ask the store to call a downstream
//!   service and return its result inline
//! - **Dedup**: Block fingerprints drive the store's upload-hit lookup so
//!   identical content is never transferred twice
//!
//! # Example
//!
//! ```no_run
//! use ufile_uploadr::{config::Config, store::UfileClient, upload::UploadRequestBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let client = UfileClient::from_config(&config)?;
//!
//!     let request = UploadRequestBuilder::new()
//!         .from_file("cat.jpg", "image/jpeg")
//!         .name_as("photos/cat.jpg")
//!         .to_bucket("demo-bucket")
//!         .build()?;
//!     let result = client.put_file(request, None).await?;
//!     println!("{:?}", result.etag);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod fingerprint;
pub mod metrics;
pub mod store;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use fingerprint::ContentFingerprint;
pub use store::{Endpoint, UfileClient};
pub use upload::{UploadError, UploadOutcome, UploadRequest, UploadRequestBuilder, UploadResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
