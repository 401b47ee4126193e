//! Sign-in, OAuth callback, sign-out and session status handlers.
//!
//! - GET /auth/signin - "already signed in?" check, else where to start OAuth
//! - GET /auth/callback - OAuth code exchange and post-login redirect
//! - POST /auth/signout - end the session
//! - GET /api/v1/session - session verdict and route for client-side checks
//!
//! Every path that routes a signed-in principal goes through the shared [`RouteResolver`],
//! so the callback and the sign-in check cannot disagree.
//!
//! [`RouteResolver`]: crate::services::route_service::RouteResolver

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::{bind_request, clear_cookie, read_cookie, session_cookie},
    models::session::{
        CODE_VERIFIER_COOKIE_NAME, RouteDecision, SESSION_COOKIE_NAME, SessionReason,
        SessionStatusResponse, SessionValidity,
    },
    services::session_service::{SESSION_EXPIRED_NOTICE, SessionProvider, sign_out_if_required},
    state::AppState,
};

/// OAuth provider used when the sign-in page does not name one.
const DEFAULT_OAUTH_PROVIDER: &str = "google";

const SIGN_IN_PATH: &str = "/auth/signin";
const CALLBACK_PATH: &str = "/auth/callback";
const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    #[serde(default)]
    pub provider: Option<String>,
}

/// Returned to a browser that is not signed in.
///
/// ```json
/// {
///   "authorize_url": "https://auth.example.com/auth/v1/authorize?provider=google&redirect_to=...",
///   "notice": "Session expired. Please sign in again."
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub authorize_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub next: Option<String>,
}

/// Sign-in page check.
///
/// # Responses
///
/// - **303**: already signed in, redirected to `/onboarding` or `/keys` on the same origin the
///   callback uses
/// - **200**: not signed in, body carries the authorize URL. When a broken session was
///   purged the session cookie is cleared and a one-time notice is included. An expired
///   cookie is cleared without a notice.
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SignInQuery>,
) -> Result<Response, AppError> {
    let auth = bind_request(&state, &headers);
    let (validity, route) = state
        .resolver
        .resolve_current(&auth, state.profiles.as_ref())
        .await;
    let origin = redirect_origin(&state.config, &headers);

    if let Some(route) = route {
        return Ok(Redirect::to(&format!("{origin}{}", route.path())).into_response());
    }

    let provider = query
        .provider
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_OAUTH_PROVIDER);
    let authorize_url = state
        .auth
        .authorize_url(provider, &format!("{origin}{CALLBACK_PATH}"))
        .map_err(|e| AppError::AuthProvider(e.to_string()))?
        .to_string();

    let signed_out = sign_out_if_required(&auth, &validity).await;
    let body = Json(SignInResponse {
        authorize_url,
        notice: signed_out.then_some(SESSION_EXPIRED_NOTICE),
    });

    if signed_out || holds_stale_cookie(&headers, &validity) {
        return Ok((
            [(header::SET_COOKIE, clear_cookie(SESSION_COOKIE_NAME))],
            body,
        )
            .into_response());
    }

    Ok(body.into_response())
}

/// OAuth callback.
///
/// # Process
///
/// 1. Exchange `code` for a session
/// 2. Fetch the principal with the new session
/// 3. Resolve onboarding vs dashboard
/// 4. Store the session cookie and redirect
///
/// `next` is used only when the principal could not be fetched, and only if it is a local path.
/// A missing code or failed exchange redirects to the auth error page.
pub async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let origin = redirect_origin(&state.config, &headers);

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        return Redirect::to(&format!("{origin}{AUTH_CODE_ERROR_PATH}")).into_response();
    };

    let auth = bind_request(&state, &headers);
    let result = state
        .resolver
        .complete_sign_in(
            &auth,
            |session| state.auth.with_session(session),
            state.profiles.as_ref(),
            code,
        )
        .await;

    let (session, route) = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(error = %err, "OAuth code exchange failed");
            return Redirect::to(&format!("{origin}{AUTH_CODE_ERROR_PATH}")).into_response();
        }
    };

    let next = match route {
        Some(route) => route.path(),
        None => local_path(query.next.as_deref()).unwrap_or(RouteDecision::GoToOnboarding.path()),
    };

    (
        AppendHeaders([
            (
                header::SET_COOKIE,
                session_cookie(&session, !state.config.is_development()),
            ),
            (header::SET_COOKIE, clear_cookie(CODE_VERIFIER_COOKIE_NAME)),
        ]),
        Redirect::to(&format!("{origin}{next}")),
    )
        .into_response()
}

/// End the session with the provider and locally.
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = bind_request(&state, &headers);

    if let Err(err) = auth.sign_out().await {
        tracing::warn!(error = %err, "provider sign-out failed");
    }

    (
        [(header::SET_COOKIE, clear_cookie(SESSION_COOKIE_NAME))],
        Redirect::to(SIGN_IN_PATH),
    )
        .into_response()
}

/// Session verdict plus route, for client-side checks.
///
/// # Response (200 OK)
///
/// ```json
/// { "is_valid": true, "should_sign_out": false, "route": "dashboard" }
/// ```
pub async fn session_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = bind_request(&state, &headers);
    let (validity, route) = state
        .resolver
        .resolve_current(&auth, state.profiles.as_ref())
        .await;

    let clear = sign_out_if_required(&auth, &validity).await
        || holds_stale_cookie(&headers, &validity);
    let body = Json(SessionStatusResponse { validity, route });

    if clear {
        return (
            [(header::SET_COOKIE, clear_cookie(SESSION_COOKIE_NAME))],
            body,
        )
            .into_response();
    }

    body.into_response()
}

/// Origin for absolute redirects.
///
/// Behind a proxy in production the forwarded host wins; otherwise `SITE_URL`.
fn redirect_origin(config: &Config, headers: &HeaderMap) -> String {
    if !config.is_development() {
        if let Some(host) = headers
            .get("x-forwarded-host")
            .and_then(|h| h.to_str().ok())
            .filter(|h| !h.is_empty())
        {
            return format!("https://{host}");
        }
    }

    config.site_url.trim_end_matches('/').to_string()
}

/// A session cookie is present but reads as no session, so it has expired.
fn holds_stale_cookie(headers: &HeaderMap, validity: &SessionValidity) -> bool {
    validity.reason == Some(SessionReason::NoSession)
        && read_cookie(headers, SESSION_COOKIE_NAME).is_some()
}

/// Accept only same-site absolute paths.
fn local_path(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//"))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn config(environment: &str) -> Config {
        envy::from_iter(vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/ray".to_string()),
            ("AUTH_URL".to_string(), "https://auth.example.com".to_string()),
            ("AUTH_ANON_KEY".to_string(), "anon".to_string()),
            ("SITE_URL".to_string(), "https://app.example.com/".to_string()),
            ("ENVIRONMENT".to_string(), environment.to_string()),
        ])
        .unwrap()
    }

    fn forwarded() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-host", HeaderValue::from_static("dash.example.com"));
        headers
    }

    #[test]
    fn production_prefers_forwarded_host() {
        assert_eq!(
            redirect_origin(&config("production"), &forwarded()),
            "https://dash.example.com"
        );
    }

    #[test]
    fn development_uses_site_url() {
        assert_eq!(
            redirect_origin(&config("development"), &forwarded()),
            "https://app.example.com"
        );
        assert_eq!(
            redirect_origin(&config("production"), &HeaderMap::new()),
            "https://app.example.com"
        );
    }

    #[test]
    fn only_local_paths_are_followed() {
        assert_eq!(local_path(Some("/keys")), Some("/keys"));
        assert_eq!(local_path(Some("https://evil.example.com")), None);
        assert_eq!(local_path(Some("//evil.example.com")), None);
        assert_eq!(local_path(None), None);
    }
}
