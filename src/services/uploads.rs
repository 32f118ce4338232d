use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

const MB: usize = 1024 * 1024;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const DOCUMENT_EXTENSIONS: &[&str] = &["doc", "docx"];
const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/octet-stream",
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unknown upload category: {0}")]
    UnknownCategory(String),

    #[error("No file provided")]
    MissingFile,

    #[error("File exceeds the {limit_mb}MB limit")]
    TooLarge { limit_mb: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    Image,
    Photo,
    SpotMap,
    Document,
}

impl UploadCategory {
    pub fn parse(raw: &str) -> Result<Self, UploadError> {
        match raw {
            "image" => Ok(UploadCategory::Image),
            "photo" => Ok(UploadCategory::Photo),
            "spot-map" => Ok(UploadCategory::SpotMap),
            "document" => Ok(UploadCategory::Document),
            other => Err(UploadError::UnknownCategory(other.to_string())),
        }
    }

    pub fn dir(&self) -> &'static str {
        match self {
            UploadCategory::Image => "images",
            UploadCategory::Photo => "photos",
            UploadCategory::SpotMap => "spot-maps",
            UploadCategory::Document => "documents",
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            UploadCategory::Image | UploadCategory::Photo => 5 * MB,
            UploadCategory::SpotMap | UploadCategory::Document => 10 * MB,
        }
    }

    fn accepts(&self, extension: &str, content_type: Option<&str>) -> bool {
        let (extensions, mime_types) = match self {
            UploadCategory::Document => (DOCUMENT_EXTENSIONS, DOCUMENT_MIME_TYPES),
            _ => (IMAGE_EXTENSIONS, IMAGE_MIME_TYPES),
        };
        extensions.contains(&extension)
            && content_type.map_or(true, |ct| mime_types.contains(&ct))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub url: String,
    pub filename: String,
    pub original_name: String,
    pub size: usize,
}

/// Writes accepted uploads under a fixed directory tree; served back at `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn store(
        &self,
        category: UploadCategory,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, UploadError> {
        let extension = validate(category, original_name, content_type, bytes.len())?;
        let filename = stored_filename(bytes, &extension, chrono::Utc::now().timestamp_millis());

        let dir = self.root.join(category.dir());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&filename), bytes).await?;

        tracing::info!("Stored upload {}/{} ({} bytes)", category.dir(), filename, bytes.len());

        Ok(StoredFile {
            url: format!("/uploads/{}/{}", category.dir(), filename),
            filename,
            original_name: original_name.to_string(),
            size: bytes.len(),
        })
    }
}

/// Check size and type; returns the lowercased extension.
pub fn validate(
    category: UploadCategory,
    original_name: &str,
    content_type: Option<&str>,
    size: usize,
) -> Result<String, UploadError> {
    if size == 0 {
        return Err(UploadError::MissingFile);
    }
    if size > category.max_bytes() {
        return Err(UploadError::TooLarge { limit_mb: category.max_bytes() / MB });
    }

    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| UploadError::UnsupportedType(original_name.to_string()))?;

    if !category.accepts(&extension, content_type) {
        return Err(UploadError::UnsupportedType(
            content_type.unwrap_or(extension.as_str()).to_string(),
        ));
    }
    Ok(extension)
}

/// `<millis>-<first 16 hex of sha256>.<ext>`
pub fn stored_filename(bytes: &[u8], extension: &str, timestamp_millis: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash = format!("{:x}", hasher.finalize());
    format!("{}-{}.{}", timestamp_millis, &hash[..16], extension)
}
