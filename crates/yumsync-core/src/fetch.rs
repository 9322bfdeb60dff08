//! Upstream HTTP access.
//!
//! Every request carries no-cache headers so a CDN in front of the
//! upstream repository cannot serve an index staler than what the origin
//! would return. Downloads are streamed to disk and hashed on the way
//! through.

use std::path::Path;
use std::time::Duration;

use reqwest::header;
use sha2::{Digest, Sha256, Sha512};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::{ErrorContext, FetchError};
use crate::package::ChecksumKind;

/// Hard ceiling for index files buffered in memory.
pub const MAX_INDEX_BYTES: u64 = 256 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for upstream repositories.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

/// Result of streaming a file to disk.
#[derive(Debug)]
pub struct Downloaded {
    /// Bytes received.
    pub length: u64,
    /// Hex digest of the body, when a checksum kind was requested.
    pub digest: Option<String>,
}

impl Fetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Fetches a small index file fully into memory.
    ///
    /// # Errors
    ///
    /// Fails when the request errors, the server answers with a
    /// non-success status or the body exceeds [`MAX_INDEX_BYTES`].
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!("Fetching {url}");
        let mut response = self.get(url).await?;
        let mut data = match response.content_length() {
            Some(length) if length > MAX_INDEX_BYTES => {
                return Err(FetchError::ResponseTooLarge {
                    url: url.to_string(),
                    limit: MAX_INDEX_BYTES,
                });
            }
            Some(length) => Vec::with_capacity(length as usize),
            None => Vec::new(),
        };
        while let Some(chunk) = response.chunk().await? {
            if data.len() as u64 + chunk.len() as u64 > MAX_INDEX_BYTES {
                return Err(FetchError::ResponseTooLarge {
                    url: url.to_string(),
                    limit: MAX_INDEX_BYTES,
                });
            }
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    /// Streams a file to disk, hashing it on the way through.
    ///
    /// # Arguments
    ///
    /// * `url` - Source URL
    /// * `dest` - File to create
    /// * `checksum` - Algorithm to hash the body with, when verification is wanted
    /// * `limit` - Abort once the body grows past this many bytes
    ///
    /// # Errors
    ///
    /// Fails when the request errors, the server answers with a
    /// non-success status, the body exceeds `limit` or the file cannot
    /// be written.
    pub async fn download_to(
        &self,
        url: &Url,
        dest: &Path,
        checksum: Option<ChecksumKind>,
        limit: Option<u64>,
    ) -> Result<Downloaded, FetchError> {
        let mut response = self.get(url).await?;
        let mut file = File::create(dest)
            .await
            .with_context(|| format!("creating {}", dest.display()))?;
        let mut hasher = checksum.map(Hasher::new);
        let mut length: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            length += chunk.len() as u64;
            if let Some(limit) = limit {
                if length > limit {
                    return Err(FetchError::ResponseTooLarge {
                        url: url.to_string(),
                        limit,
                    });
                }
            }
            if let Some(ref mut hasher) = hasher {
                hasher.update(&chunk);
            }
            file.write_all(&chunk)
                .await
                .with_context(|| format!("writing {}", dest.display()))?;
        }
        file.flush()
            .await
            .with_context(|| format!("flushing {}", dest.display()))?;

        Ok(Downloaded {
            length,
            digest: hasher.map(Hasher::finalize),
        })
    }
}

/// Joins a relative metadata location onto a repository base URL.
pub fn join_url(base: &Url, relative: &str) -> Result<Url, FetchError> {
    base.join(relative)
        .map_err(|_| FetchError::InvalidUrl(format!("{base}{relative}")))
}

enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(kind: ChecksumKind) -> Self {
        match kind {
            ChecksumKind::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumKind::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(hasher) => hasher.update(data),
            Hasher::Sha512(hasher) => hasher.update(data),
        }
    }

    fn finalize(self) -> String {
        match self {
            Hasher::Sha256(hasher) => hex_digest(hasher.finalize().as_slice()),
            Hasher::Sha512(hasher) => hex_digest(hasher.finalize().as_slice()),
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
