use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartList, GuestSession, RemoveFromCartQuery},
    error::AppResult,
    extract::{AppJson, AppQuery},
    middleware::identity::{CartIdentity, CartOwner, guest_cookie},
    models::CartItem,
    response::{ApiResponse, Meta, SuccessFlag},
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart).delete(remove_from_cart))
        .route("/session", post(ensure_guest_session))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart items of the current user or guest, newest first", body = ApiResponse<CartList>)
    ),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state, &identity).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Item added", body = ApiResponse<CartItem>),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "No guest session"),
        (status = 409, description = "Product already in cart")
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    AppJson(payload): AppJson<AddToCartRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CartItem>>)> {
    let resp = cart_service::add_to_cart(&state, &identity, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    params(("id" = String, Query, description = "Product id")),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<SuccessFlag>),
        (status = 400, description = "Product id is required"),
        (status = 401, description = "No guest session"),
        (status = 404, description = "Product not found in cart")
    ),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    AppQuery(query): AppQuery<RemoveFromCartQuery>,
) -> AppResult<Json<ApiResponse<SuccessFlag>>> {
    let resp = cart_service::remove_from_cart(&state, &identity, query.id.as_deref()).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/session",
    responses(
        (status = 200, description = "Guest cart cookie present or issued", body = ApiResponse<GuestSession>)
    ),
    tag = "Cart"
)]
pub async fn ensure_guest_session(
    identity: CartIdentity,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<GuestSession>>) {
    let (jar, session) = match identity.owner() {
        Some(CartOwner::User(_)) => (
            jar,
            GuestSession {
                guest_session_id: None,
                created: false,
            },
        ),
        Some(CartOwner::Guest(id)) => (
            jar,
            GuestSession {
                guest_session_id: Some(id.clone()),
                created: false,
            },
        ),
        None => {
            let id = Uuid::new_v4().to_string();
            tracing::info!(guest_session_id = %id, "guest session issued");
            (
                jar.add(guest_cookie(id.clone())),
                GuestSession {
                    guest_session_id: Some(id),
                    created: true,
                },
            )
        }
    };

    (
        jar,
        Json(ApiResponse::success("Guest session", session, Some(Meta::empty()))),
    )
}
