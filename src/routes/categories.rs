use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::categories::CategoryCatalog,
    error::AppResult,
    response::ApiResponse,
    services::category_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_catalog))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories, each with its products in display order", body = ApiResponse<CategoryCatalog>)
    ),
    tag = "Products"
)]
pub async fn list_catalog(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryCatalog>>> {
    let resp = category_service::list_catalog(&state).await?;
    Ok(Json(resp))
}
