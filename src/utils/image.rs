use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;

use crate::core::state::ValidationError;

/// Produces `data:<mime>;base64,<payload>` strings for logo and hero uploads.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<String>;
}

pub struct FileImageLoader {
    max_bytes: u64,
}

impl FileImageLoader {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

#[async_trait]
impl ImageLoader for FileImageLoader {
    async fn load(&self, path: &Path) -> Result<String> {
        let mime = mime_for(path)
            .ok_or_else(|| ValidationError::UnsupportedImage(path.display().to_string()))?;

        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        if meta.len() > self.max_bytes {
            return Err(ValidationError::ImageTooLarge {
                size: meta.len(),
                limit: self.max_bytes,
            }
            .into());
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        log::debug!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), mime);
        Ok(to_data_uri(mime, &bytes))
    }
}
