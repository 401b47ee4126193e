//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::middleware::auth::clear_cookie;
use crate::models::session::{SESSION_COOKIE_NAME, SessionReason};
use crate::store::StoreError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation Errors**: Bad input, surfaced immediately and never retried
/// - **Persistence Errors**: A store write failed; the user may retry the action
/// - **Session Errors**: The caller must (re)authenticate
/// - **Database Errors**: Anything else from the store, details hidden from clients
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    Validation(String),

    /// A store write failed. The message names the action so the user knows what to retry.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("{action} failed. Please try again.")]
    Persistence {
        action: &'static str,
        #[source]
        source: StoreError,
    },

    /// API key is missing, malformed, or unknown.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Dashboard session is missing or no longer valid.
    ///
    /// Returns HTTP 401 Unauthorized. When `should_sign_out` is set the session cookie is
    /// cleared in the same response.
    #[error("{}", reason.message())]
    Unauthenticated {
        reason: SessionReason,
        should_sign_out: bool,
    },

    /// Key does not exist or belongs to a different principal.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    ApiKeyNotFound,

    /// The hosted auth provider failed outside of session validation.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("Authentication provider error: {0}")]
    AuthProvider(String),

    /// Store read failed.
    ///
    /// Returns HTTP 500, hiding details from the client.
    #[error("Database error: {0}")]
    Database(#[from] StoreError),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Session errors add `reason` and `should_sign_out` to the error object.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            AppError::Persistence { action, source } => {
                tracing::error!(action, error = %source, "store write failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "persistence_error",
                    self.to_string(),
                )
            }
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::ApiKeyNotFound => {
                (StatusCode::NOT_FOUND, "api_key_not_found", self.to_string())
            }
            AppError::AuthProvider(msg) => {
                tracing::error!(error = %msg, "auth provider call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "auth_provider_error",
                    "The authentication provider is unavailable".to_string(),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "store read failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Unauthenticated {
                reason,
                should_sign_out,
            } => return unauthenticated_response(*reason, *should_sign_out),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// 401 for an invalid dashboard session, clearing the cookie when a sign-out is required.
fn unauthenticated_response(reason: SessionReason, should_sign_out: bool) -> Response {
    let body = Json(json!({
        "error": {
            "code": "session_invalid",
            "message": reason.message(),
            "reason": reason,
            "should_sign_out": should_sign_out
        }
    }));

    if should_sign_out {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::SET_COOKIE, clear_cookie(SESSION_COOKIE_NAME))],
            body,
        )
            .into_response();
    }

    (StatusCode::UNAUTHORIZED, body).into_response()
}
