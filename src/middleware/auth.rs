//! Authentication middleware.
//!
//! Two ways in:
//! - Dashboard routes use the session cookie set by the OAuth callback. The session is checked
//!   with [`validate_session`] and the principal is injected as [`AuthContext`].
//! - Machine routes use `Authorization: Bearer ray_ai_sk_...`. The key is hashed, looked up,
//!   and injected as [`ApiKeyContext`].
//!
//! Unauthorized requests are rejected with HTTP 401.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::session::{CODE_VERIFIER_COOKIE_NAME, SESSION_COOKIE_NAME, Session, SessionReason},
    services::{
        auth_provider::RequestAuth,
        key_service,
        session_service::{sign_out_if_required, validate_session},
    },
    state::AppState,
};

/// Principal attached to requests that carry a valid session.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal_id: Uuid,
    pub email: Option<String>,
}

/// Key attached to requests authenticated with an API key.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub key_id: Uuid,
    pub owner_id: Uuid,
}

/// Session middleware for dashboard routes.
///
/// # Flow
///
/// 1. Read the session cookie
/// 2. Validate it with the hosted auth provider
/// 3. If valid: inject `AuthContext`, call next handler
/// 4. If invalid: sign out with the provider when required, return 401
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = bind_request(&state, request.headers());
    let validity = validate_session(&auth).await;

    let Some(principal) = validity.principal.clone().filter(|_| validity.is_valid) else {
        sign_out_if_required(&auth, &validity).await;
        return Err(AppError::Unauthenticated {
            reason: validity.reason.unwrap_or(SessionReason::NoSession),
            should_sign_out: validity.should_sign_out,
        });
    };

    request.extensions_mut().insert(AuthContext {
        principal_id: principal.id,
        email: principal.email,
    });

    Ok(next.run(request).await)
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256 and look it up
/// 3. If found: stamp `last_used_at`, inject `ApiKeyContext`, call next handler
/// 4. If not found: return 401 Unauthorized error
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Expected format: "Bearer <api_key>"
    let api_key = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidApiKey)?;

    let key = key_service::authenticate_api_key(state.keys.as_ref(), api_key.trim()).await?;

    request.extensions_mut().insert(ApiKeyContext {
        key_id: key.id,
        owner_id: key.owner_id,
    });

    Ok(next.run(request).await)
}

/// Bind the provider client to this request's cookies.
pub fn bind_request<'a>(state: &'a AppState, headers: &HeaderMap) -> RequestAuth<'a> {
    state.auth.bind(
        read_cookie(headers, SESSION_COOKIE_NAME),
        read_cookie(headers, CODE_VERIFIER_COOKIE_NAME),
    )
}

/// Extract a cookie value from the `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(&prefix))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value storing a session.
pub fn session_cookie(session: &Session, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE_NAME,
        session.to_cookie_value()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that deletes `name`.
pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
