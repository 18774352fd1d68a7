//! Durable image hosting.
//!
//! Image provider URLs expire within hours, while packs are read for months.
//! Every generated image is copied to a durable location before its URL is
//! embedded in a pack.

use crate::error::OverlayError;
use crate::key::CacheKey;
use crate::provider::{build_provider_http_client, error_for_status, map_http_error};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use blake3::Hasher;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Where the generated image currently lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Short-lived http or https URL.
    Url(String),
    /// Inline base64 payload.
    Base64(String),
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Copy the image to durable storage and return its durable URL.
    async fn rehost(&self, source: &ImageSource, key: &CacheKey) -> Result<String, OverlayError>;
}

/// Content-addressed image store on the local filesystem.
pub struct FsImageHost {
    root: PathBuf,
    client: Client,
}

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FsImageHost {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, OverlayError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            OverlayError::ConfigError(format!(
                "Failed to create image directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            client: build_provider_http_client(DOWNLOAD_TIMEOUT)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>, OverlayError> {
        match source {
            ImageSource::Base64(payload) => BASE64
                .decode(payload.trim())
                .map_err(|e| OverlayError::GenerationError(format!("invalid base64 image: {}", e))),
            ImageSource::Url(url) => {
                let parsed = Url::parse(url).map_err(|e| {
                    OverlayError::GenerationError(format!("invalid image URL {}: {}", url, e))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(OverlayError::GenerationError(format!(
                        "unsupported image URL scheme '{}'",
                        parsed.scheme()
                    )));
                }
                let response = self.client.get(parsed).send().await.map_err(map_http_error)?;
                if !response.status().is_success() {
                    return Err(error_for_status(response).await);
                }
                let bytes = response.bytes().await.map_err(map_http_error)?;
                Ok(bytes.to_vec())
            }
        }
    }
}

#[async_trait]
impl ImageHost for FsImageHost {
    async fn rehost(&self, source: &ImageSource, key: &CacheKey) -> Result<String, OverlayError> {
        let bytes = self.fetch(source).await?;
        if bytes.is_empty() {
            return Err(OverlayError::GenerationError(
                "downloaded image is empty".to_string(),
            ));
        }

        let mut hasher = Hasher::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize().as_bytes());

        let dir = self.root.join(key.workspace_type.as_str());
        let path = dir.join(format!("{}.png", digest));
        let write_path = path.clone();
        let temp_path = dir.join(format!(
            "{}.{}.tmp",
            digest,
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let size = bytes.len();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            if write_path.exists() {
                return Ok(());
            }
            // Write to a temp file and rename so a partial write never
            // appears under the content address.
            if let Err(e) = std::fs::write(&temp_path, &bytes)
                .and_then(|_| std::fs::rename(&temp_path, &write_path))
            {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e);
            }
            Ok(())
        })
        .await
        .map_err(|e| OverlayError::GenerationError(format!("image write task failed: {}", e)))?
        .map_err(|e| {
            OverlayError::GenerationError(format!(
                "failed to store image {}: {}",
                path.display(),
                e
            ))
        })?;

        let absolute = path.canonicalize().unwrap_or(path);
        let url = format!("file://{}", absolute.display());
        debug!(key = %key, bytes = size, "Stored image bytes");
        info!(key = %key, url = %url, "Image re-hosted");
        Ok(url)
    }
}
