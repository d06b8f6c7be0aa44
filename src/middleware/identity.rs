use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use sea_orm::{ActiveValue::Set, ColumnTrait, Condition, EntityTrait};
use uuid::Uuid;

use crate::{
    entity::{
        Users,
        cart_items::{ActiveModel, Column},
    },
    error::AppError,
    middleware::auth::{decode_session, session_token},
    state::AppState,
};

pub const GUEST_COOKIE: &str = "cart_session";
const GUEST_COOKIE_DAYS: i64 = 365;

/// Long-lived guest cart cookie, readable on every path.
pub fn guest_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((GUEST_COOKIE, session_id))
        .path("/")
        .max_age(time::Duration::days(GUEST_COOKIE_DAYS))
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Guest(String),
}

impl CartOwner {
    /// Rows belonging to this owner.
    pub fn condition(&self) -> Condition {
        match self {
            CartOwner::User(id) => Condition::all().add(Column::UserId.eq(*id)),
            CartOwner::Guest(session) => {
                Condition::all().add(Column::GuestSessionId.eq(session.clone()))
            }
        }
    }

    /// Binds a new row to this owner, leaving the other identity column empty.
    pub fn assign(&self, active: &mut ActiveModel) {
        match self {
            CartOwner::User(id) => {
                active.user_id = Set(Some(*id));
                active.guest_session_id = Set(None);
            }
            CartOwner::Guest(session) => {
                active.user_id = Set(None);
                active.guest_session_id = Set(Some(session.clone()));
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CartOwner::User(_) => "user",
            CartOwner::Guest(_) => "guest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartIdentity(pub Option<CartOwner>);

impl CartIdentity {
    /// An authenticated session wins over the guest cookie; with neither,
    /// the request has no cart.
    pub fn resolve(headers: &HeaderMap, jwt_secret: &str) -> Self {
        if let Some(user) = session_token(headers).and_then(|t| decode_session(&t, jwt_secret)) {
            return CartIdentity(Some(CartOwner::User(user.user_id)));
        }
        Self::guest(headers)
    }

    pub fn guest(headers: &HeaderMap) -> Self {
        let guest = CookieJar::from_headers(headers)
            .get(GUEST_COOKIE)
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty());
        CartIdentity(guest.map(CartOwner::Guest))
    }

    pub fn owner(&self) -> Option<&CartOwner> {
        self.0.as_ref()
    }

    pub fn require(&self) -> Result<&CartOwner, AppError> {
        self.owner().ok_or(AppError::NoGuestSession)
    }
}

impl<S> FromRequestParts<S> for CartIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let identity = CartIdentity::resolve(&parts.headers, &state.session.jwt_secret);

        // A signed token can outlive its user; such a session counts as absent.
        if let Some(CartOwner::User(user_id)) = identity.owner() {
            if Users::find_by_id(*user_id).one(&state.orm).await?.is_none() {
                tracing::debug!(user_id = %user_id, "session user no longer exists");
                return Ok(CartIdentity::guest(&parts.headers));
            }
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth_service::issue_token;
    use crate::models::Role;
    use axum::http::{HeaderValue, header};

    const SECRET: &str = "identity-test-secret";

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn no_session_and_no_cookie_is_none() {
        assert_eq!(CartIdentity::resolve(&HeaderMap::new(), SECRET), CartIdentity(None));
    }

    #[test]
    fn guest_cookie_yields_guest_owner() {
        let map = headers(&[(header::COOKIE, "theme=dark; cart_session=abc-123")]);
        assert_eq!(
            CartIdentity::resolve(&map, SECRET).owner(),
            Some(&CartOwner::Guest("abc-123".into()))
        );
    }

    #[test]
    fn session_wins_over_guest_cookie() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, Role::User, SECRET, 1).unwrap();
        let map = headers(&[
            (header::AUTHORIZATION, &format!("Bearer {token}")),
            (header::COOKIE, "cart_session=abc-123"),
        ]);
        assert_eq!(
            CartIdentity::resolve(&map, SECRET).owner(),
            Some(&CartOwner::User(user_id))
        );
    }

    #[test]
    fn invalid_session_falls_back_to_guest() {
        let token = issue_token(Uuid::new_v4(), Role::User, "other-secret", 1).unwrap();
        let map = headers(&[(header::COOKIE, &format!("session_token={token}; cart_session=g1"))]);
        assert_eq!(
            CartIdentity::resolve(&map, SECRET).owner(),
            Some(&CartOwner::Guest("g1".into()))
        );
    }

    #[test]
    fn guest_cookie_lasts_a_year_on_root_path() {
        let cookie = guest_cookie("g1".into());
        assert_eq!(cookie.name(), GUEST_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(365)));
    }

    #[test]
    fn require_reports_missing_guest_session() {
        assert!(matches!(
            CartIdentity(None).require(),
            Err(AppError::NoGuestSession)
        ));
    }
}
