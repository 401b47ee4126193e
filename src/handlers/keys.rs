//! API key HTTP handlers.
//!
//! This module implements the key endpoints:
//! - POST /api/v1/keys - Issue a new key (plaintext returned once)
//! - GET /api/v1/keys - List the caller's keys, redacted
//! - DELETE /api/v1/keys/{id} - Revoke a key
//! - POST /api/v1/keys/verify - Check a candidate key against the caller's keys
//! - GET /api/v1/whoami - Identify the key on an API-key authenticated request

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::{ApiKeyContext, AuthContext},
    models::api_key::{
        ApiKeyResponse, CreateApiKeyRequest, CreatedApiKeyResponse, VerifyApiKeyRequest,
        VerifyApiKeyResponse,
    },
    services::key_service,
    state::AppState,
};

/// Issue a new API key.
///
/// # Endpoint
///
/// `POST /api/v1/keys`
///
/// # Authentication
///
/// Requires a valid session cookie.
///
/// # Request Body
///
/// ```json
/// { "name": "Production" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: The key record plus the plaintext `api_key`, shown only here
/// - **Error (400)**: Name missing, not a string, blank or too long
/// - **Error (401)**: No valid session
/// - **Error (503)**: The insert failed; nothing was stored and the request can be repeated
pub async fn create_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreatedApiKeyResponse>), AppError> {
    let name = request
        .name
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            AppError::Validation("Key name is required and must be a non-empty string".to_string())
        })?;

    let issued = state
        .issuer
        .generate_key(state.keys.as_ref(), auth.principal_id, name)
        .await?;

    let display_key = key_service::display_key(&issued.record);

    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKeyResponse {
            id: issued.record.id,
            name: issued.record.name,
            api_key: issued.plaintext,
            display_key,
            created_at: issued.record.created_at,
        }),
    ))
}

/// List the caller's keys, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/keys`
///
/// Keys are returned in display form only; neither plaintext nor hash leaves the server.
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = key_service::list_keys(state.keys.as_ref(), auth.principal_id).await?;

    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

/// Revoke one of the caller's keys.
///
/// # Endpoint
///
/// `DELETE /api/v1/keys/{id}`
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (404)**: No such key for this principal
pub async fn delete_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    key_service::revoke_key(state.keys.as_ref(), auth.principal_id, key_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Check whether a candidate key is one of the caller's keys.
///
/// # Endpoint
///
/// `POST /api/v1/keys/verify`
///
/// ```json
/// { "api_key": "ray_ai_sk_..." }
/// ```
///
/// The candidate is compared exactly as sent. Always 200; the answer is in `valid`.
pub async fn verify_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<VerifyApiKeyRequest>,
) -> Result<Json<VerifyApiKeyResponse>, AppError> {
    let valid =
        key_service::verify_key(state.keys.as_ref(), &request.api_key, auth.principal_id).await?;

    Ok(Json(VerifyApiKeyResponse { valid }))
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub key_id: Uuid,
    pub owner_id: Uuid,
}

/// Identify the presented API key.
///
/// # Endpoint
///
/// `GET /api/v1/whoami`
///
/// # Authentication
///
/// Requires `Authorization: Bearer ray_ai_sk_...`.
pub async fn whoami(Extension(key): Extension<ApiKeyContext>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        key_id: key.key_id,
        owner_id: key.owner_id,
    })
}
