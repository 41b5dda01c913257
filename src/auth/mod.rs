//! Session-based authentication
//!
//! The real identity provider is an external collaborator; this module
//! implements the contract the service consumes from it: an authenticated
//! flag (session validation) plus the redirect-with-return-target behavior
//! for unauthenticated page requests. Tokens are stored hashed at rest.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// A freshly issued session. The bearer token is only available here; the
/// store keeps a digest.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Authenticated caller, inserted into request extensions by `require_auth`
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
}

/// Session persistence over the shared SQLite pool
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(pool: SqlitePool, ttl_hours: i64) -> Self {
        Self {
            pool,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a new session token for a user
    pub async fn create(&self, user_id: &str) -> Result<Session> {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let expires_at = now + self.ttl;

        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Session {
            token,
            user_id: user_id.to_string(),
            expires_at,
        })
    }

    /// Validate a presented token. Returns the principal for a live session,
    /// `None` for unknown or expired tokens.
    pub async fn validate(&self, token: &str) -> Result<Option<Principal>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?")
                .bind(hash_token(token))
                .fetch_optional(&self.pool)
                .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|e| AppError::Internal(format!("bad session expiry: {}", e)))?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            // Expired sessions are dropped lazily on next use
            let _ = self.revoke(token).await;
            return Ok(None);
        }

        Ok(Some(Principal { user_id }))
    }

    /// Revoke a token. Returns whether a session was removed.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Middleware guarding protected routes.
///
/// Accepts a bearer token or a `session` cookie. API paths get a 401 JSON
/// body; anything else is redirected to the auth entry point carrying the
/// original path as the return target.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let token = extract_bearer(request.headers().get(header::AUTHORIZATION))
        .or_else(|| extract_session_cookie(request.headers().get(header::COOKIE)));

    let Some(token) = token else {
        return unauthenticated_response(&path);
    };

    match state.sessions().validate(&token).await {
        Ok(Some(principal)) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Ok(None) => unauthenticated_response(&path),
        Err(err) => err.into_response(),
    }
}

fn unauthenticated_response(path: &str) -> Response {
    if path.starts_with("/api/") {
        AppError::Unauthorized("authentication required".to_string()).into_response()
    } else {
        Redirect::to(&auth_redirect_target(path)).into_response()
    }
}

/// Auth entry point with the original path as the `next` return target
fn auth_redirect_target(path: &str) -> String {
    format!("/auth?next={}", urlencoding::encode(path))
}

fn extract_bearer(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}

fn extract_session_cookie(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "session").then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::initialize_schema;
    use axum::http::{HeaderValue, StatusCode};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SessionStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_schema(&pool).await.unwrap();
        SessionStore::new(pool, 24)
    }

    #[test]
    fn test_hash_token_is_stable_and_opaque() {
        let a = hash_token("secret");
        let b = hash_token("secret");
        assert_eq!(a, b);
        assert_ne!(a, "secret");
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_extract_bearer() {
        let value = HeaderValue::from_static("Bearer abc123");
        assert_eq!(extract_bearer(Some(&value)).as_deref(), Some("abc123"));

        let value = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer(Some(&value)), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn test_extract_session_cookie() {
        let value = HeaderValue::from_static("theme=dark; session=tok42; other=1");
        assert_eq!(
            extract_session_cookie(Some(&value)).as_deref(),
            Some("tok42")
        );

        let value = HeaderValue::from_static("theme=dark");
        assert_eq!(extract_session_cookie(Some(&value)), None);
    }

    #[test]
    fn test_unauthenticated_api_path_gets_401() {
        let response = unauthenticated_response("/api/v1/resumes");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    #[test]
    fn test_unauthenticated_page_path_redirects_with_return_target() {
        let response = unauthenticated_response("/resumes");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth?next=%2Fresumes"
        );
    }

    #[test]
    fn test_auth_redirect_target_encodes_path() {
        assert_eq!(auth_redirect_target("/"), "/auth?next=%2F");
        assert_eq!(
            auth_redirect_target("/resumes/my cv"),
            "/auth?next=%2Fresumes%2Fmy%20cv"
        );
    }

    #[tokio::test]
    async fn test_create_validate_revoke() {
        let store = store().await;

        let session = store.create("user-1").await.unwrap();
        assert!(session.expires_at > Utc::now());

        let principal = store.validate(&session.token).await.unwrap().unwrap();
        assert_eq!(principal.user_id, "user-1");

        assert!(store.revoke(&session.token).await.unwrap());
        assert!(store.validate(&session.token).await.unwrap().is_none());
        assert!(!store.revoke(&session.token).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let store = store().await;
        assert!(store.validate("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let store = store().await;
        let session = store.create("user-1").await.unwrap();

        // Force the session into the past
        sqlx::query("UPDATE sessions SET expires_at = ?")
            .bind((Utc::now() - Duration::hours(1)).to_rfc3339())
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store.validate(&session.token).await.unwrap().is_none());
    }
}
