//! API key models.
//!
//! API keys are issued to signed-in principals from the dashboard and presented by their
//! programs as bearer tokens. Only the SHA-256 hash of a key is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_key` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `user_id`: Principal that owns the key
/// - `name`: Label chosen by the owner
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `created_at`: When the key was created
/// - `last_used_at`: When the key last authenticated a request
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// Principal that created the key. Never changes.
    #[sqlx(rename = "user_id")]
    pub owner_id: Uuid,

    /// Trimmed, non-empty label
    pub name: String,

    /// SHA-256 hash of the plaintext key (64 lowercase hex characters)
    ///
    /// When a request comes in with "Bearer ray_ai_sk_...", we:
    /// 1. Hash the presented key with SHA-256
    /// 2. Look up this hash in the database
    /// 3. If found, authenticate the request
    pub key_hash: String,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,

    /// Updated by the request-authentication middleware, never by issuance
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Request body for creating a key.
///
/// `name` is kept as raw JSON so a non-string value is reported as a validation error
/// rather than a deserialization failure. `keyName` is accepted as an alias.
///
/// ```json
/// { "name": "Production" }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    #[serde(default, alias = "keyName")]
    pub name: Option<serde_json::Value>,
}

/// Response returned once, when a key is created.
///
/// This is the only place the plaintext key ever leaves the server.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Production",
///   "api_key": "ray_ai_sk_9f86d081884c7d65...",
///   "display_key": "ray_ai_sk_550e8400e29b...",
///   "created_at": "2025-01-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub display_key: String,
    pub created_at: DateTime<Utc>,
}

/// Key as shown in the dashboard list. No plaintext, no hash.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub display_key: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            display_key: crate::services::key_service::display_key(&key),
            id: key.id,
            name: key.name,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
        }
    }
}

/// Request body for checking a candidate key against the caller's keys.
#[derive(Debug, Deserialize)]
pub struct VerifyApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyApiKeyResponse {
    pub valid: bool,
}
