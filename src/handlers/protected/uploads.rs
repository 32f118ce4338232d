// handlers/protected/uploads.rs - POST /api/uploads/:category

use axum::extract::{Multipart, Path, State};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::uploads::StoredFile;
use crate::services::{UploadCategory, UploadError};
use crate::state::AppState;

/// Multipart form field carrying the file.
pub const FILE_FIELD: &str = "file";

/// POST /api/uploads/:category - `image`, `photo`, `spot-map` or `document`
///
/// Returns the stored file's public `url` (under `/uploads`).
pub async fn upload(
    State(state): State<AppState>,
    Path(category): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<StoredFile> {
    let category = UploadCategory::parse(&category)?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let stored = state
            .uploads
            .store(category, &original_name, content_type.as_deref(), &bytes)
            .await?;
        return Ok(ApiResponse::success(stored).with_message("File uploaded successfully"));
    }

    Err(ApiError::from(UploadError::MissingFile))
}
