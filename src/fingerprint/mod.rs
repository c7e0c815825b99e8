//! Content fingerprinting for upload-hit lookups
//!
//! Computes the block-bounded content digest the store uses to recognise
//! content it already holds. The file is read once, sequentially, one block
//! at a time; at most one block buffer is alive during the computation.
//!
//! # Layout
//!
//! Every block of `block_size` bytes (the last one may be short) is hashed
//! with SHA-1. The aggregate digest is the single block digest when the file
//! fits in one block, otherwise the SHA-1 of all block digests concatenated in
//! file order. The lookup key sent to the store is the URL-safe base64 of the
//! little-endian block count followed by the aggregate digest.
//!
//! This fingerprint is only a dedup lookup key. Transfer integrity is the
//! whole-file MD5 in [`crate::upload::integrity`].
//!
//! # Example
//!
//! ```
//! use ufile_uploadr::fingerprint::ContentFingerprint;
//!
//! let fp = ContentFingerprint::from_reader(&b"hello world"[..], 4).unwrap();
//! assert_eq!(fp.block_count(), 3);
//! assert_eq!(fp.file_size(), 11);
//! ```

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Default fingerprint block size (4 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// SHA-1 digest of one block
pub type BlockDigest = [u8; 20];

/// Block-level content fingerprint of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFingerprint {
    block_size: usize,
    file_size: u64,
    blocks: Vec<BlockDigest>,
    aggregate: BlockDigest,
    etag: String,
}

impl ContentFingerprint {
    /// Fingerprint the file at `path`.
    ///
    /// Blocking; use [`ContentFingerprint::compute_async`] from async code.
    pub fn compute<P: AsRef<Path>>(path: P, block_size: usize) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, block_size)
    }

    /// Fingerprint the file at `path` on tokio's blocking pool
    pub async fn compute_async(path: PathBuf, block_size: usize) -> io::Result<Self> {
        tokio::task::spawn_blocking(move || Self::compute(path, block_size))
            .await
            .map_err(io::Error::other)?
    }

    /// Fingerprint everything `reader` yields
    pub fn from_reader<R: Read>(mut reader: R, block_size: usize) -> io::Result<Self> {
        if block_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "fingerprint block size must be positive",
            ));
        }

        let mut buf = vec![0u8; block_size];
        let mut blocks = Vec::new();
        let mut file_size = 0u64;

        loop {
            let n = read_block(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            blocks.push(sha1(&buf[..n]));
            file_size += n as u64;
            if n < block_size {
                break;
            }
        }

        // An empty file is a single empty block
        if blocks.is_empty() {
            blocks.push(sha1(&[]));
        }

        let aggregate = if blocks.len() == 1 {
            blocks[0]
        } else {
            let mut hasher = Sha1::new();
            for block in &blocks {
                hasher.update(block);
            }
            let mut out = [0u8; 20];
            out.copy_from_slice(&hasher.finalize());
            out
        };

        let mut key = Vec::with_capacity(24);
        key.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        key.extend_from_slice(&aggregate);
        let etag = URL_SAFE.encode(key);

        Ok(Self {
            block_size,
            file_size,
            blocks,
            aggregate,
            etag,
        })
    }

    /// Encoded lookup key sent as the `Hash` query parameter
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Aggregate digest over all blocks
    pub fn aggregate(&self) -> &BlockDigest {
        &self.aggregate
    }

    /// Per-block digests in file order
    pub fn blocks(&self) -> &[BlockDigest] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of bytes fingerprinted
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

/// Fill `buf` from `reader`, stopping early only at EOF
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn sha1(data: &[u8]) -> BlockDigest {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Sha1::digest(data));
    out
}
