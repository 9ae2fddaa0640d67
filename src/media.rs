// src/media.rs

use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// One file part received from a multipart form.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub url: String,
    pub public_id: String,
    /// Seconds, when the backend can determine it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug)]
pub enum MediaError {
    Empty(String),
    Storage(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Empty(what) => write!(f, "{} is empty", what),
            MediaError::Storage(msg) => write!(f, "media storage failed: {}", msg),
        }
    }
}

impl std::error::Error for MediaError {}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn upload(&self, upload: MediaUpload) -> Result<MediaAsset, MediaError>;

    /// Removes a previously uploaded file. Unknown ids are not an error.
    async fn remove(&self, public_id: &str) -> Result<(), MediaError>;
}

/// Stores uploads on the local filesystem and serves them under `/media/`.
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: Url,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: Url) -> Self {
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Lowercase alphanumeric extension of `file_name`, or `bin`.
fn extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string())
}

/// Public ids are bare file names produced by `upload`.
fn is_safe_public_id(public_id: &str) -> bool {
    !public_id.is_empty()
        && public_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.')
        && !public_id.contains("..")
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn upload(&self, upload: MediaUpload) -> Result<MediaAsset, MediaError> {
        if upload.bytes.is_empty() {
            return Err(MediaError::Empty(
                upload.file_name.unwrap_or_else(|| "upload".to_string()),
            ));
        }

        let public_id = format!(
            "{}.{}",
            uuid::Uuid::new_v4().simple(),
            extension(upload.file_name.as_deref())
        );

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;
        tokio::fs::write(self.root.join(&public_id), &upload.bytes)
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        let url = self
            .base_url
            .join(&format!("media/{}", public_id))
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        tracing::info!(
            public_id = %public_id,
            bytes = upload.bytes.len(),
            content_type = upload.content_type.as_deref().unwrap_or("unknown"),
            "stored upload"
        );

        Ok(MediaAsset {
            url: url.to_string(),
            public_id,
            duration: None,
        })
    }

    async fn remove(&self, public_id: &str) -> Result<(), MediaError> {
        if !is_safe_public_id(public_id) {
            return Err(MediaError::Storage(format!("refusing to remove '{}'", public_id)));
        }
        match tokio::fs::remove_file(self.root.join(public_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::Storage(e.to_string())),
        }
    }
}
