//! Auth endpoints
//!
//! - POST /api/v1/auth/login  - exchange the access key for a session token
//! - POST /api/v1/auth/logout - revoke the presented token
//! - GET  /api/v1/auth/me     - current session info

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{require_auth, Principal};
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    access_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user_id: String,
    is_authenticated: bool,
}

/// Create the auth router
pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new().route("/login", post(login)).merge(protected)
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    if request.access_key != state.config().auth.access_key {
        return Err(AppError::Unauthorized("invalid access key".to_string()));
    }

    let session = state.sessions().create("default").await?;

    tracing::info!(user_id = %session.user_id, "Session issued");

    Ok(Json(LoginResponse {
        token: session.token,
        user_id: session.user_id,
        expires_at: session.expires_at,
    }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::BadRequest("missing bearer token".to_string()))?;

    state.sessions().revoke(token).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn me(Extension(principal): Extension<Principal>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: principal.user_id,
        is_authenticated: true,
    })
}
