use axum::extract::multipart::Field;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    storage::{ImageFile, MAX_IMAGE_BYTES, UploadError},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
}

/// Multipart body of `POST /api/upload`; documentation only.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub path_name: Option<String>,
}

/// Buffers a file part chunk by chunk. Stops reading as soon as the part
/// grows past `MAX_IMAGE_BYTES` and fails with an `image` field error, so an
/// oversized file is rejected without draining the rest of the body.
pub async fn read_image_field(mut field: Field<'_>) -> AppResult<ImageFile> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();

    let mut bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let size = bytes.len() + chunk.len();
        if size > MAX_IMAGE_BYTES {
            return Err(UploadError::TooLarge {
                size_mb: size as f64 / (1024.0 * 1024.0),
            }
            .into());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(ImageFile::new(file_name, content_type, bytes))
}
