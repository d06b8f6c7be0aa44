use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};

use crate::{
    dto::users::UpdateProfileRequest,
    entity::users::{self, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

async fn find_self(state: &AppState, user: &AuthUser) -> AppResult<users::Model> {
    // A valid token whose user was deleted is treated as no session.
    Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = find_self(state, user).await?;
    Ok(ApiResponse::success("Profile", User::from(model), Some(Meta::empty())))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let name = match payload.name.as_deref().map(str::trim) {
        Some(name) if name.chars().count() < 2 => {
            return Err(AppError::field("name", "Name must be at least 2 characters long"));
        }
        other => other.map(str::to_string),
    };
    let image = payload.image.map(|i| i.trim().to_string());

    let mut active: users::ActiveModel = find_self(state, user).await?.into();
    if let Some(name) = name {
        active.name = Set(Some(name));
    }
    if let Some(image) = image {
        active.image = Set(Some(image).filter(|i| !i.is_empty()));
    }
    let updated = active.update(&state.orm).await?;

    tracing::info!(user_id = %user.user_id, "profile updated");
    Ok(ApiResponse::success("Profile updated", User::from(updated), Some(Meta::empty())))
}
