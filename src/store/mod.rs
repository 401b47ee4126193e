//! Storage seams for keys and profiles.
//!
//! Services talk to these traits rather than to the pool directly so the issuance engine and
//! the route resolver can run against an in-memory store in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{api_key::ApiKey, profile::OnboardingRequest, profile::Profile};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

/// Failure reported by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint fired (e.g. duplicate `key_hash`).
    #[error("unique constraint violated")]
    Conflict,

    /// The store could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Key table, scoped by owner everywhere except hash lookup.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Insert a new key row. Exactly one attempt; callers never retry this.
    async fn insert_api_key(
        &self,
        owner_id: Uuid,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, StoreError>;

    /// All keys for an owner, newest first.
    async fn list_api_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, StoreError>;

    /// Returns `false` when no key with that id belongs to the owner.
    async fn delete_api_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, StoreError>;

    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StoreError>;

    async fn touch_api_key(&self, key_id: Uuid) -> Result<(), StoreError>;
}

/// Profile table, keyed by principal id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` means the row does not exist yet, which is not an error.
    async fn find_profile(&self, principal_id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// Create or update the profile and mark onboarding complete.
    async fn complete_onboarding(
        &self,
        principal_id: Uuid,
        form: &OnboardingRequest,
    ) -> Result<Profile, StoreError>;
}
