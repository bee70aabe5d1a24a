//! Image uploads stored on local disk.
//!
//! Files are accepted only when both the declared content type and the
//! leading magic bytes agree on one of the supported image formats. Stored
//! names are random UUIDs so uploads never collide or expose client names.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::UploadConfig;

/// URL prefix uploads are served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Errors from storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file was uploaded")]
    Missing,

    #[error("file is larger than {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("only PNG, JPEG, WebP and GIF images are allowed")]
    UnsupportedType,

    #[error("file content does not match its type")]
    ContentMismatch,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageKind {
    /// Format for a declared MIME type.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Format identified by the file signature.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP") {
            Some(Self::Webp)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// A stored upload.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub file_name: String,
    /// Path relative to the site root, e.g. `/uploads/<uuid>.png`.
    pub url: String,
    pub content_type: &'static str,
    pub size: usize,
}

/// Local-disk upload store.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_bytes: config.max_bytes,
        }
    }

    /// Directory uploads are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check type, signature and size.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` for formats other than the
    /// supported images and `UploadError::ContentMismatch` when the bytes
    /// disagree with the declared type.
    pub fn validate(&self, content_type: Option<&str>, data: &[u8]) -> Result<ImageKind, UploadError> {
        if data.is_empty() {
            return Err(UploadError::Missing);
        }
        if data.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }
        let declared = content_type
            .and_then(ImageKind::from_content_type)
            .ok_or(UploadError::UnsupportedType)?;
        let actual = ImageKind::sniff(data).ok_or(UploadError::ContentMismatch)?;
        if declared != actual {
            return Err(UploadError::ContentMismatch);
        }
        Ok(actual)
    }

    /// Validate and write an upload.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or `UploadError::Io` if the write fails.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub async fn save(&self, content_type: Option<&str>, data: &[u8]) -> Result<StoredFile, UploadError> {
        let kind = self.validate(content_type, data)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), kind.extension());
        tokio::fs::write(self.dir.join(&file_name), data).await?;
        tracing::info!(file_name = %file_name, "Upload stored");

        Ok(StoredFile {
            url: format!("{PUBLIC_PREFIX}/{file_name}"),
            file_name,
            content_type: kind.mime(),
            size: data.len(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const WEBP: &[u8] = b"RIFF\x24\0\0\0WEBPVP8 ";

    fn store(dir: PathBuf) -> UploadStore {
        UploadStore::new(&UploadConfig {
            dir,
            max_bytes: 64,
        })
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageKind::sniff(PNG), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(JPEG), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(WEBP), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"GIF89a\x01\0"), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"%PDF-1.7"), None);
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WAVE"), None);
    }

    #[test]
    fn test_content_type_with_parameters() {
        assert_eq!(
            ImageKind::from_content_type("image/PNG; charset=binary"),
            Some(ImageKind::Png)
        );
        assert_eq!(ImageKind::from_content_type("image/svg+xml"), None);
    }

    #[test]
    fn test_validate_rejects_mismatch_and_size() {
        let store = store(std::env::temp_dir());
        assert_eq!(store.validate(Some("image/png"), PNG).unwrap(), ImageKind::Png);
        assert!(matches!(
            store.validate(Some("image/jpeg"), PNG),
            Err(UploadError::ContentMismatch)
        ));
        assert!(matches!(
            store.validate(Some("text/html"), PNG),
            Err(UploadError::UnsupportedType)
        ));
        assert!(matches!(
            store.validate(None, PNG),
            Err(UploadError::UnsupportedType)
        ));
        assert!(matches!(
            store.validate(Some("image/png"), &[0u8; 65]),
            Err(UploadError::TooLarge { max_bytes: 64 })
        ));
        assert!(matches!(
            store.validate(Some("image/png"), &[]),
            Err(UploadError::Missing)
        ));
    }

    #[tokio::test]
    async fn test_save_writes_uuid_named_file() {
        let dir = std::env::temp_dir().join(format!("haat-uploads-{}", Uuid::new_v4()));
        let store = store(dir.clone());

        let stored = store.save(Some("image/webp"), WEBP).await.unwrap();
        assert!(stored.file_name.ends_with(".webp"));
        assert_eq!(stored.url, format!("/uploads/{}", stored.file_name));
        assert_eq!(stored.size, WEBP.len());

        let written = tokio::fs::read(dir.join(&stored.file_name)).await.unwrap();
        assert_eq!(written, WEBP);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
