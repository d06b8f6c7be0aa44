use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};

use crate::{
    dto::upload::{UploadForm, UploadResponse, read_image_field},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    state::AppState,
    storage::{ImageFile, UploadError},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(upload_image))
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Public URL of the stored image", body = ApiResponse<UploadResponse>),
        (status = 400, description = "No file provided, unsupported type or too large"),
        (status = 500, description = "Image upload failed")
    ),
    tag = "Upload"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadResponse>>> {
    let mut file: Option<ImageFile> = None;
    let mut folder: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("file") => file = Some(read_image_field(field).await?),
            Some("pathName") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                folder = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest(UploadError::Missing.to_string()))?;
    let result = match folder.as_deref() {
        Some(folder) => state.images.upload_to(&file, folder).await,
        None => state.images.upload(&file).await,
    };
    let url = result.map_err(|err| {
        if err.is_validation() {
            AppError::BadRequest(err.to_string())
        } else {
            AppError::Upload(err)
        }
    })?;

    Ok(Json(ApiResponse::success(
        "Image uploaded",
        UploadResponse { url },
        Some(Meta::empty()),
    )))
}
