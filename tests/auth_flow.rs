mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use axum_bookstore_api::{
    dto::{
        auth::{LoginRequest, RegisterRequest},
        users::{UpdateProfileRequest, UpdateRoleRequest},
    },
    error::AppError,
    middleware::auth::decode_session,
    models::Role,
    routes::app_router,
    services::{admin_service, auth_service, user_service},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use common::{JWT_SECRET, seed_admin, test_app};

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: Some("Ada".into()),
        email: email.into(),
        password: "correct horse".into(),
    }
}

#[tokio::test]
async fn register_then_login_issues_user_session() -> anyhow::Result<()> {
    let app = test_app().await?;

    let user = auth_service::register_user(&app.state, register_request("Ada@Example.com"))
        .await?
        .data
        .unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.role, Role::User);

    let dup = auth_service::register_user(&app.state, register_request("ada@example.com")).await;
    assert!(matches!(dup, Err(AppError::BadRequest(_))));

    let login = auth_service::login_user(
        &app.state,
        LoginRequest {
            email: "ada@example.com".into(),
            password: "correct horse".into(),
        },
    )
    .await?
    .data
    .unwrap();
    let session = decode_session(&login.token, JWT_SECRET).expect("valid token");
    assert_eq!(session.user_id, user.id);
    assert!(!session.is_admin());

    let wrong = auth_service::login_user(
        &app.state,
        LoginRequest {
            email: "ada@example.com".into(),
            password: "wrong".into(),
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn profile_name_must_have_two_characters() -> anyhow::Result<()> {
    let app = test_app().await?;
    let user = auth_service::register_user(&app.state, register_request("p@example.com"))
        .await?
        .data
        .unwrap();
    let auth = axum_bookstore_api::middleware::auth::AuthUser {
        user_id: user.id,
        role: Role::User,
    };

    let short = user_service::update_profile(
        &app.state,
        &auth,
        UpdateProfileRequest {
            name: Some(" A ".into()),
            image: None,
        },
    )
    .await
    .expect_err("short name");
    assert_eq!(
        short.fields().and_then(|f| f.get("name")).map(String::as_str),
        Some("Name must be at least 2 characters long")
    );

    let updated = user_service::update_profile(
        &app.state,
        &auth,
        UpdateProfileRequest {
            name: Some("  Grace ".into()),
            image: Some("https://cdn.test/avatar.png".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Grace"));
    assert_eq!(updated.image.as_deref(), Some("https://cdn.test/avatar.png"));
    Ok(())
}

#[tokio::test]
async fn admin_can_promote_users() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let user = auth_service::register_user(&app.state, register_request("promote@example.com"))
        .await?
        .data
        .unwrap();

    let promoted = admin_service::set_user_role(
        &app.state,
        &admin,
        user.id,
        UpdateRoleRequest { role: Role::Admin },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(promoted.role, Role::Admin);

    let missing = admin_service::set_user_role(
        &app.state,
        &admin,
        Uuid::new_v4(),
        UpdateRoleRequest { role: Role::User },
    )
    .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn http_login_sets_cookie_usable_for_profile() -> anyhow::Result<()> {
    let app = test_app().await?;
    let router = app_router(app.state.clone(), 1024 * 1024);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": "web@example.com", "password": "secret123" })
                        .to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": "web@example.com", "password": "secret123" })
                        .to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .expect("session cookie");
    assert!(cookie.starts_with("session_token="));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/users/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await?.to_bytes();
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["data"]["email"], "web@example.com");
    assert_eq!(body["data"]["role"], "USER");

    let response = router
        .oneshot(Request::builder().uri("/api/users/me").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
