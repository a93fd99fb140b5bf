//! Auth routes: portal login, registration, session management, route guard.

use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::{ApiError, ApiJson};
use crate::services::directory::{self, DemoCredentials, DirectoryError, PublicUser, Registration, Role};
use crate::services::guard::{self, GuardDecision};
use crate::services::session::{self, SessionUser};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie or a bearer token.
/// Use as a handler parameter to require authentication.
#[derive(Debug)]
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

impl AuthUser {
    /// # Errors
    ///
    /// `403` unless the user holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if session::is_authorized(Some(&self.user), roles) { Ok(()) } else { Err(ApiError::forbidden()) }
    }
}

fn request_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(COOKIE_NAME).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_owned());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = request_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        let user = app_state
            .sessions
            .validate(&token)
            .await
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Self { user, token })
    }
}

impl<S> axum::extract::OptionalFromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(<Self as axum::extract::FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .ok())
    }
}

// =============================================================================
// COOKIES
// =============================================================================

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let max_age = Duration::seconds(i64::try_from(state.config.session_ttl.as_secs()).unwrap_or(i64::MAX));
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(max_age)
        .build()
}

fn clear_session_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

pub(crate) fn directory_error(err: &DirectoryError) -> ApiError {
    let status = match err {
        DirectoryError::UserExists => StatusCode::CONFLICT,
        DirectoryError::Hash(_) => {
            tracing::error!(error = %err, "password hashing failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };
    ApiError::from_code(status, err)
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub token: String,
    pub redirect: String,
}

/// `POST /api/auth/login/{role}`: verify credentials for a portal and open a session.
pub async fn login(
    State(state): State<AppState>,
    Path(portal): Path<String>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Response, ApiError> {
    let role = Role::parse(&portal).ok_or_else(|| ApiError::not_found("Login portal"))?;
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = directory::authenticate(&state.directory, &body.email, &body.password, Some(role))
        .await
        .map_err(|e| directory_error(&e))?
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "E_INVALID_CREDENTIALS", "Invalid credentials"))?;

    if user.role != role {
        tracing::info!(user_id = %user.id, portal = %role, "login rejected: wrong portal");
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "E_WRONG_PORTAL",
            format!("You are not authorized as a {}. Please use the correct login page.", role.title()),
        ));
    }

    let token = state.sessions.create(SessionUser::from(&user)).await;
    tracing::info!(user_id = %user.id, role = %user.role, "login ok");

    let jar = CookieJar::new().add(session_cookie(&state, token.clone()));
    let body = LoginResponse { redirect: format!("/dashboard/{role}"), user, token };
    Ok((jar, Json(body)).into_response())
}

/// `POST /api/auth/register`: self-service student/parent sign-up.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<Registration>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user = directory::register(&state.directory, form)
        .await
        .map_err(|e| directory_error(&e))?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "user": user }))))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    state.sessions.delete(&auth.token).await;
    tracing::info!(user_id = %auth.user.id, "logout");

    let jar = CookieJar::new().add(clear_session_cookie(&state));
    (jar, StatusCode::NO_CONTENT)
}

/// `GET /api/auth/demo-credentials/{role}`
pub async fn demo_credentials(Path(role): Path<String>) -> Json<DemoCredentials> {
    Json(directory::demo_credentials(&role))
}

#[derive(Deserialize)]
pub struct GuardQuery {
    pub path: String,
    pub roles: Option<String>,
}

/// `GET /api/auth/guard?path=..&roles=a,b`: where should the front-end go?
pub async fn guard(auth: Option<AuthUser>, Query(query): Query<GuardQuery>) -> Json<GuardDecision> {
    let roles = query.roles.as_deref().map(guard::parse_roles);
    let user = auth.as_ref().map(|a| &a.user);
    Json(guard::authorize(user, &query.path, roles.as_deref()))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
