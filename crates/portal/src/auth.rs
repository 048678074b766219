//! Session authentication middleware and auth handlers.
//!
//! A session token is accepted from an `Authorization: Bearer` header or the
//! `compass_session` cookie. [`require_session`] resolves it to a [`Caller`]
//! stored in request extensions; the per-role guards then admit one role each.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use compass_core::access::Caller;
use compass_core::auth as core_auth;
use compass_core::http::{extract_bearer_token, extract_client_ip, extract_cookie};
use compass_core::models::common::Role;
use compass_core::students::{self, Registration};

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;

pub const SESSION_COOKIE_NAME: &str = "compass_session";

/// Extract the session token, preferring the `Authorization` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
    .or_else(|| {
        extract_cookie(
            headers.get(header::COOKIE).and_then(|v| v.to_str().ok()),
            SESSION_COOKIE_NAME,
        )
    })
}

pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    extract_client_ip(
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok()),
    )
}

/// Reject requests without a live session; otherwise attach the [`Caller`].
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = session_token(req.headers()) else {
        return ApiError::unauthorized().into_response();
    };
    match core_auth::resolve_session(&state.repo, &token).await {
        Ok(Some(caller)) => {
            let caller = caller.with_ip(client_ip(req.headers()));
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Ok(None) => ApiError::unauthorized().into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn guard(role: Role, req: Request, next: Next) -> Response {
    let allowed = req.extensions().get::<Caller>().map(|c| c.role == role);
    match allowed {
        Some(true) => next.run(req).await,
        Some(false) => ApiError::forbidden().into_response(),
        None => ApiError::unauthorized().into_response(),
    }
}

pub async fn student_only(req: Request, next: Next) -> Response {
    guard(Role::Student, req, next).await
}

pub async fn advisor_only(req: Request, next: Next) -> Response {
    guard(Role::Advisor, req, next).await
}

pub async fn admin_only(req: Request, next: Next) -> Response {
    guard(Role::Admin, req, next).await
}

pub async fn sales_only(req: Request, next: Next) -> Response {
    guard(Role::Sales, req, next).await
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}")
}

// -- Handlers --

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub role: Role,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub email: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Response> {
    let ip = client_ip(&headers);
    let session = core_auth::login(
        &state.repo,
        state.config.portal.session_hours,
        body.role,
        &body.email,
        &body.password,
        ip.as_deref(),
    )
    .await?;

    let max_age = (session.expires_at - session.created_at).num_seconds();
    let cookie = session_cookie(&session.token, max_age);
    let response = LoginResponse {
        token: session.token,
        role: session.role,
        email: session.email,
        expires_at: session.expires_at,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(response)).into_response())
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = session_token(&headers) {
        if let Err(e) = core_auth::logout(&state.repo, &token).await {
            warn!(error = %e, "failed to delete session");
        }
    }
    Ok((
        [(header::SET_COOKIE, session_cookie("", 0))],
        Json(json!({ "ok": true })),
    )
        .into_response())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<Registration>,
) -> ApiResult<impl IntoResponse> {
    let student = students::register_student(&state.repo, body).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// GET /api/auth/me
pub async fn me(Extension(caller): Extension<Caller>) -> Json<serde_json::Value> {
    Json(json!({ "role": caller.role, "email": caller.email }))
}
