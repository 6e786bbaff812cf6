/// Media upload collaborator
///
/// Avatars and cover images arrive as local files (written by the multipart
/// extractor) and are handed to a `MediaUploader`, which returns the public
/// URL or `None` if there was nothing to upload.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::configuration::MediaSettings;
use crate::error::{AppError, MediaError};

const MAX_EXTENSION_LENGTH: usize = 8;

/// A file already on local disk; the caller owns it and removes it afterwards
#[derive(Debug, Clone, Copy)]
pub struct LocalFile<'a> {
    pub path: &'a Path,
    pub original_name: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedMedia {
    pub url: String,
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// `Ok(None)` when the file is missing or empty
    async fn upload(&self, file: LocalFile<'_>) -> Result<Option<UploadedMedia>, AppError>;

    /// Removes media that ended up unused. Already gone is not an error.
    async fn discard(&self, media: &UploadedMedia) -> Result<(), AppError>;
}

/// Copies uploads into a directory that the server exposes under `/uploads`
pub struct LocalMediaStore {
    upload_dir: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(settings: &MediaSettings) -> Self {
        Self {
            upload_dir: settings.upload_dir.clone(),
            public_base_url: settings.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The file under `upload_dir` that a URL from `upload` points at
    fn stored_path(&self, url: &str) -> Option<PathBuf> {
        let prefix = format!("{}/uploads/", self.public_base_url);
        url.strip_prefix(&prefix)
            .filter(|name| {
                !name.is_empty()
                    && !name.starts_with('.')
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            })
            .map(|name| self.upload_dir.join(name))
    }

    fn stored_name(original_name: Option<&str>) -> String {
        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LENGTH
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| ext.to_ascii_lowercase());

        match extension {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl MediaUploader for LocalMediaStore {
    async fn upload(&self, file: LocalFile<'_>) -> Result<Option<UploadedMedia>, AppError> {
        let metadata = match tokio::fs::metadata(file.path).await {
            Ok(metadata) => metadata,
            Err(_) => return Ok(None),
        };
        if !metadata.is_file() || metadata.len() == 0 {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.upload_dir).await?;

        let name = Self::stored_name(file.original_name);
        let destination = self.upload_dir.join(&name);
        tokio::fs::copy(file.path, &destination)
            .await
            .map_err(|e| MediaError::UploadFailed(e.to_string()))?;

        tracing::debug!(stored_as = %name, "Media uploaded");

        Ok(Some(UploadedMedia {
            url: format!("{}/uploads/{}", self.public_base_url, name),
        }))
    }

    async fn discard(&self, media: &UploadedMedia) -> Result<(), AppError> {
        let path = self
            .stored_path(&media.url)
            .ok_or_else(|| MediaError::Io(format!("not a stored upload: {}", media.url)))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(url = %media.url, "Media discarded");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
