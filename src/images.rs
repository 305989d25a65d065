//! Photo inputs for the identification agent.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const DEFAULT_MIME: &str = "image/jpeg";

/// Raw image bytes plus the MIME type sent alongside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Where the photo was read from, when it came from disk.
    pub source: Option<PathBuf>,
}

impl ImageInput {
    pub fn from_bytes(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
            source: None,
        }
    }

    /// Read a photo from disk, guessing the MIME type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image: {}", path.display()))?;
        Ok(Self {
            mime_type: mime_for_path(path),
            bytes,
            source: Some(path.to_path_buf()),
        })
    }

    /// `file://` URL of the source photo, used when no image host is
    /// configured or an upload fails.
    pub fn file_url(&self) -> Option<String> {
        let path = self.source.as_ref()?;
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
        Some(format!("file://{}", absolute.display()))
    }
}

/// MIME type for an image path; non-image or unknown extensions fall back
/// to `image/jpeg`.
pub fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MIME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_known_extensions() {
        assert_eq!(mime_for_path(Path::new("front.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("back.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("label.webp")), "image/webp");
    }

    #[test]
    fn test_mime_falls_back_to_jpeg() {
        assert_eq!(mime_for_path(Path::new("photo")), DEFAULT_MIME);
        assert_eq!(mime_for_path(Path::new("notes.txt")), DEFAULT_MIME);
    }

    #[tokio::test]
    async fn test_from_path_records_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("front.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let image = ImageInput::from_path(&path).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes.len(), 4);
        assert!(image.file_url().unwrap().starts_with("file://"));
        assert!(image.file_url().unwrap().ends_with("front.png"));
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let err = ImageInput::from_path(Path::new("/nonexistent/front.jpg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read image"));
    }
}
