use crate::error::AppError;
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Largest thumbnail body accepted from the network.
const MAX_THUMBNAIL_BYTES: usize = 10 * 1024 * 1024;

/// Loads a remote thumbnail and returns it as a data URI.
#[async_trait]
pub trait ThumbnailLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<String, AppError>;
}

/// Disk-backed thumbnail cache keyed by the SHA-256 of the URL.
pub struct ThumbnailCache {
    dir: PathBuf,
    client: reqwest::Client,
}

impl ThumbnailCache {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            client: reqwest::Client::new(),
        }
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.dir.join(hex::encode(Sha256::digest(url.as_bytes())))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(format!("Failed to download {}: HTTP {}", url, response.status()).into());
        }

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0).min(MAX_THUMBNAIL_BYTES as u64) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > MAX_THUMBNAIL_BYTES {
                return Err(format!("Thumbnail {} exceeds {} bytes", url, MAX_THUMBNAIL_BYTES).into());
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }

    async fn store(&self, path: &Path, bytes: &[u8]) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| AppError {
            message: format!("Failed to create thumbnail cache {}: {}", self.dir.display(), e),
        })?;
        tokio::fs::write(path, bytes).await.map_err(|e| AppError {
            message: format!("Failed to write thumbnail {}: {}", path.display(), e),
        })
    }
}

#[async_trait]
impl ThumbnailLoader for ThumbnailCache {
    async fn load(&self, url: &str) -> Result<String, AppError> {
        let path = self.cache_path(url);

        if let Ok(bytes) = tokio::fs::read(&path).await {
            if let Ok(uri) = to_data_uri(&bytes) {
                debug!(%url, "Thumbnail cache hit");
                return Ok(uri);
            }
        }

        let bytes = self.download(url).await?;
        let uri = to_data_uri(&bytes)?;
        // The thumbnail is still shown when it cannot be cached
        match self.store(&path, &bytes).await {
            Ok(()) => debug!(%url, size = bytes.len(), "Thumbnail cached"),
            Err(e) => warn!(%url, error = %e, "Thumbnail not cached"),
        }
        Ok(uri)
    }
}

/// Validates that the bytes are a decodable image and wraps them in a data URI.
fn to_data_uri(bytes: &[u8]) -> Result<String, AppError> {
    let format = image::guess_format(bytes)?;
    image::load_from_memory_with_format(bytes, format)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", format.to_mime_type(), b64))
}
