//! Screenshot storage
//!
//! Captures are never inlined into transcripts or events; they are uploaded
//! and referenced by URL.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("Upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Upload response did not include a URL")]
    MissingUrl,

    #[error("Failed to write screenshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores image bytes and returns a URL that resolves to them
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, ImageStoreError>;
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Multipart upload to an image host (Cloudinary-compatible response shape)
pub struct HttpImageStore {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

impl HttpImageStore {
    pub fn new(upload_url: impl Into<String>, upload_preset: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
            upload_preset,
        }
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, ImageStoreError> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(format!("screenshot.{}", extension_for(mime_type)))
            .mime_str(mime_type)?;
        let mut form = Form::new().part("file", part);
        if let Some(preset) = &self.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageStoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = response.json().await?;
        let url = parsed
            .secure_url
            .or(parsed.url)
            .ok_or(ImageStoreError::MissingUrl)?;
        debug!(size, url = %url, "Uploaded screenshot");
        Ok(url)
    }
}

/// Writes captures to a local directory and hands back `file://` URLs
pub struct FileImageStore {
    directory: PathBuf,
}

impl FileImageStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl ImageStore for FileImageStore {
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, ImageStoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(format!(
            "screenshot_{}_{}.{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S"),
            Uuid::new_v4().simple(),
            extension_for(mime_type)
        ));
        tokio::fs::write(&path, &bytes).await?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        let url = url::Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| absolute.display().to_string());
        info!(path = %absolute.display(), "Saved screenshot");
        Ok(url)
    }
}

/// Strip a leading "Screenshot URL:" style label from model or tool text
pub fn strip_screenshot_label(text: &str) -> &str {
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();
    for label in ["screenshot url:", "screenshot:"] {
        if lowered.starts_with(label) {
            return trimmed[label.len()..].trim();
        }
    }
    trimmed
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts uploads and returns predictable URLs
    #[derive(Default)]
    pub(crate) struct MemoryImageStore {
        pub uploads: AtomicUsize,
        pub fail: bool,
    }

    #[async_trait]
    impl ImageStore for MemoryImageStore {
        async fn upload(&self, _bytes: Vec<u8>, _mime: &str) -> Result<String, ImageStoreError> {
            if self.fail {
                return Err(ImageStoreError::MissingUrl);
            }
            let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("https://images.test/shot-{n}.jpg"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_returns_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileImageStore::new(dir.path().join("shots"));
        let url = store.upload(vec![1, 2, 3], "image/jpeg").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".jpg"));

        let path = url::Url::parse(&url).unwrap().to_file_path().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_strip_screenshot_label() {
        assert_eq!(
            strip_screenshot_label("Screenshot URL: https://img.test/a.jpg"),
            "https://img.test/a.jpg"
        );
        assert_eq!(strip_screenshot_label("  https://img.test/b.jpg "), "https://img.test/b.jpg");
        assert_eq!(strip_screenshot_label("screenshot:https://x"), "https://x");
    }

    #[test]
    fn test_upload_response_prefers_secure_url() {
        let parsed: UploadResponse = serde_json::from_str(
            r#"{"secure_url":"https://a","url":"http://a","public_id":"x"}"#,
        )
        .unwrap();
        assert_eq!(parsed.secure_url.or(parsed.url).as_deref(), Some("https://a"));
    }
}
