//! Content + metadata fingerprinting
//!
//! Computes the [`Identity`] of a filesystem entry: SHA-256 over
//! content plus size and mtime. Deterministic for identical bytes, so
//! a rename shows up as the same identity at a new path and the
//! classifier can tell "moved" from "duplicated".
//!
//! Fingerprinting fails non-fatally: if the bytes cannot be read (IO
//! error, permissions, mid-write) the identity carries `digest: None`,
//! which routes to the `FingerprintMissing` stall category instead of
//! blocking the scan.

use std::path::Path;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::debug;

use tandem_core::domain::newtypes::ContentDigest;
use tandem_core::domain::tree::Identity;

use crate::error::ScanError;

/// Read buffer size for streaming hashes
const CHUNK_SIZE: usize = 64 * 1024;

/// Computes entry identities
pub struct Fingerprinter;

impl Fingerprinter {
    /// Identity of a file on disk
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Stat` only if metadata itself is
    /// unreadable. A content-read failure yields `Ok` with
    /// `digest: None`.
    pub async fn identity_of(path: &Path) -> Result<Identity, ScanError> {
        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|source| ScanError::Stat {
                path: path.to_path_buf(),
                source,
            })?;
        let size = meta.len();
        let mtime = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let digest = match Self::digest_file(path).await {
            Ok(d) => Some(d),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Content unreadable, fingerprint missing");
                None
            }
        };

        Ok(Identity {
            digest,
            size,
            mtime,
        })
    }

    /// Streaming SHA-256 of a file's contents
    pub async fn digest_file(path: &Path) -> std::io::Result<ContentDigest> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let out: [u8; 32] = hasher.finalize().into();
        Ok(ContentDigest::from_bytes(&out))
    }

    /// SHA-256 of an in-memory buffer (verification after download)
    #[must_use]
    pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
        let out: [u8; 32] = Sha256::digest(bytes).into();
        ContentDigest::from_bytes(&out)
    }
}
