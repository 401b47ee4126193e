//! Ray Dashboard - Main Application Entry Point
//!
//! Backend for the Ray developer dashboard. Principals sign in through a hosted OAuth provider,
//! complete a one-time onboarding form, and then manage API keys for their programs.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Sessions**: Hosted auth provider, session kept in an HttpOnly cookie
//! - **API keys**: `ray_ai_sk_` keys, only their SHA-256 hash is stored
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the auth provider client and shared state
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod store;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::services::auth_provider::HostedAuthClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!(environment = %config.environment, "Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let auth = HostedAuthClient::new(
        &config.auth_url,
        config.auth_anon_key.clone(),
        config.auth_request_timeout(),
    )
    .context("failed to build auth provider client")?;

    let addr = format!("0.0.0.0:{}", config.server_port);
    let app = router(AppState::new(pool, config, auth));

    // Bind to network address and start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the HTTP router.
fn router(state: AppState) -> Router {
    // Dashboard routes, session cookie required
    let session_routes = Router::new()
        .route("/api/v1/onboarding", post(handlers::onboarding::complete_onboarding))
        .route(
            "/api/v1/keys",
            post(handlers::keys::create_key).get(handlers::keys::list_keys),
        )
        .route("/api/v1/keys/verify", post(handlers::keys::verify_key))
        .route("/api/v1/keys/{id}", delete(handlers::keys::delete_key))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::session_middleware,
        ));

    // Machine routes, API key required
    let api_key_routes = Router::new()
        .route("/api/v1/whoami", get(handlers::keys::whoami))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::api_key_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/auth/signin", get(handlers::auth::sign_in))
        .route("/auth/callback", get(handlers::auth::oauth_callback))
        .route("/auth/signout", post(handlers::auth::sign_out))
        .route("/api/v1/session", get(handlers::auth::session_status))
        .merge(session_routes)
        .merge(api_key_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::models::session::Session;
    use crate::store::memory::MemoryStore;

    /// Nothing listens on port 9, so any provider call fails as unavailable.
    const UNREACHABLE_AUTH_URL: &str = "http://127.0.0.1:9";

    fn test_state(store: Arc<MemoryStore>) -> AppState {
        AppState::in_memory(store, UNREACHABLE_AUTH_URL)
    }

    #[tokio::test]
    async fn whoami_identifies_presented_key() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(store.clone());
        let owner = Uuid::new_v4();
        let issued = state
            .issuer
            .generate_key(store.as_ref(), owner, "CI")
            .await
            .unwrap();

        let response = router(state)
            .oneshot(
                Request::get("/api/v1/whoami")
                    .header(header::AUTHORIZATION, format!("Bearer {}", issued.plaintext))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["owner_id"], owner.to_string());
        assert_eq!(json["key_id"], issued.record.id.to_string());
        assert!(store.stored_keys()[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn whoami_rejects_missing_or_unknown_key() {
        let app = router(test_state(Arc::new(MemoryStore::new())));

        let missing = app
            .clone()
            .oneshot(Request::get("/api/v1/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let unknown = app
            .oneshot(
                Request::get("/api/v1/whoami")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer ray_ai_sk_{}", "0".repeat(64)),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dashboard_routes_require_a_session() {
        let response = router(test_state(Arc::new(MemoryStore::new())))
            .oneshot(Request::get("/api/v1/keys").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // No session at all is not a reason to clear cookies
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn callback_without_code_goes_to_error_page() {
        let response = router(test_state(Arc::new(MemoryStore::new())))
            .oneshot(Request::get("/auth/callback").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://localhost:3000/auth/auth-code-error"
        );
    }

    #[tokio::test]
    async fn signed_out_visitor_gets_authorize_url() {
        let response = router(test_state(Arc::new(MemoryStore::new())))
            .oneshot(
                Request::get("/auth/signin?provider=github")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let url = json["authorize_url"].as_str().unwrap();
        assert!(url.starts_with("http://127.0.0.1:9/auth/v1/authorize?provider=github"));
        assert!(json.get("notice").is_none());
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn with_session_cookie(uri: &str, cookie: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::COOKIE, format!("ray_session={cookie}"))
            .body(Body::empty())
            .unwrap()
    }

    fn session_expiring_at(expires_at: i64) -> String {
        Session {
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: Some(expires_at),
        }
        .to_cookie_value()
    }

    /// Serve `GET /auth/v1/user` for `principal_id` on a local port and return its base URL.
    async fn spawn_auth_provider(principal_id: Uuid) -> String {
        let provider = Router::new().route(
            "/auth/v1/user",
            get(move || async move {
                axum::Json(serde_json::json!({ "id": principal_id, "email": "dev@example.com" }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, provider).await.unwrap() });
        format!("http://{addr}")
    }

    const CLEARED_SESSION: &str = "ray_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

    #[tokio::test]
    async fn corrupted_session_on_sign_in_is_cleared_with_notice() {
        let response = router(test_state(Arc::new(MemoryStore::new())))
            .oneshot(with_session_cookie("/auth/signin", "%%%"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SET_COOKIE], CLEARED_SESSION);
        let json = body_json(response).await;
        assert_eq!(json["notice"], "Session expired. Please sign in again.");
        assert!(json["authorize_url"].as_str().is_some());
    }

    #[tokio::test]
    async fn corrupted_session_status_reports_reason_and_clears_cookie() {
        let response = router(test_state(Arc::new(MemoryStore::new())))
            .oneshot(with_session_cookie("/api/v1/session", "%%%"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SET_COOKIE], CLEARED_SESSION);
        let json = body_json(response).await;
        assert_eq!(json["is_valid"], false);
        assert_eq!(json["should_sign_out"], true);
        assert_eq!(json["reason"], "session_corrupted");
        assert!(json.get("route").is_none());
    }

    #[tokio::test]
    async fn expired_session_cookie_is_cleared_without_notice() {
        let app = router(test_state(Arc::new(MemoryStore::new())));
        let expired = session_expiring_at(1);

        let status = app
            .clone()
            .oneshot(with_session_cookie("/api/v1/session", &expired))
            .await
            .unwrap();
        assert_eq!(status.headers()[header::SET_COOKIE], CLEARED_SESSION);
        let json = body_json(status).await;
        assert_eq!(json["reason"], "no_session");
        assert_eq!(json["should_sign_out"], false);

        let sign_in = app
            .oneshot(with_session_cookie("/auth/signin", &expired))
            .await
            .unwrap();
        assert_eq!(sign_in.headers()[header::SET_COOKIE], CLEARED_SESSION);
        assert!(body_json(sign_in).await.get("notice").is_none());
    }

    #[tokio::test]
    async fn signed_in_visitor_is_redirected_on_the_callback_origin() {
        let principal_id = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(principal_id, true);
        let state = AppState::in_memory(store, &spawn_auth_provider(principal_id).await);
        let live = session_expiring_at(chrono::Utc::now().timestamp() + 3600);
        let app = router(state);

        let sign_in = app
            .clone()
            .oneshot(with_session_cookie("/auth/signin", &live))
            .await
            .unwrap();
        assert_eq!(sign_in.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            sign_in.headers()[header::LOCATION],
            "http://localhost:3000/keys"
        );

        let status = app
            .oneshot(with_session_cookie("/api/v1/session", &live))
            .await
            .unwrap();
        assert!(status.headers().get(header::SET_COOKIE).is_none());
        let json = body_json(status).await;
        assert_eq!(json["is_valid"], true);
        assert_eq!(json["route"], "dashboard");
    }
}
