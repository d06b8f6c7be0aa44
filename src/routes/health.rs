use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    db::check_connection,
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DbHealthData {
    pub status: String,
    pub latency_ms: u64,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "OK", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check() -> Json<ApiResponse<HealthData>> {
    let data = HealthData {
        status: "ok".to_string(),
    };

    Json(ApiResponse::success(
        "Health check",
        data,
        Some(Meta::empty()),
    ))
}

#[utoipa::path(
    get,
    path = "/api/health/db",
    responses(
        (status = 200, description = "Database reachable", body = ApiResponse<DbHealthData>),
        (status = 503, description = "Database unreachable", body = ApiResponse<DbHealthData>),
    ),
    tag = "Health"
)]
pub async fn db_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<DbHealthData>>) {
    let health = check_connection(&state.orm).await;
    let latency_ms = health.latency.as_millis() as u64;

    let (status, message, label) = if health.healthy {
        (StatusCode::OK, "Database connection healthy", "healthy")
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Database connection failed",
            "unhealthy",
        )
    };

    let data = DbHealthData {
        status: label.to_string(),
        latency_ms,
    };
    (
        status,
        Json(ApiResponse::success(message, data, Some(Meta::empty()))),
    )
}
