//! API key issuance and verification.
//!
//! # Key Format
//!
//! `ray_ai_sk_` followed by 64 lowercase hex characters (32 random bytes). The prefix lets
//! other systems recognize a key by shape alone.
//!
//! # Storage
//!
//! Only `sha256(plaintext)` is stored. Verification hashes the candidate and compares digests in
//! constant time. The plaintext is returned once from [`KeyIssuer::generate_key`] and never
//! logged, stored, or re-derived.

use std::sync::Arc;

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::api_key::ApiKey;
use crate::store::{ApiKeyStore, StoreError};

/// Namespace tag every key starts with.
pub const KEY_PREFIX: &str = "ray_ai_sk_";

/// Random bytes per key.
pub const KEY_BYTES: usize = 32;

/// Characters of the record id shown in a redacted key.
const DISPLAY_ID_CHARS: usize = 12;

/// Appended to redacted keys.
const DISPLAY_MASK: &str = "...";

const MAX_KEY_NAME_CHARS: usize = 100;

/// Bounds on a presented key before it is worth hashing.
const MIN_PRESENTED_KEY_LEN: usize = 20;
const MAX_PRESENTED_KEY_LEN: usize = 200;

/// Source of key material.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Thread-local CSPRNG, reseeded from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rng().fill_bytes(dest);
    }
}

/// A freshly issued key. `plaintext` must go straight to the caller.
#[derive(Debug)]
pub struct IssuedKey {
    pub plaintext: String,
    pub record: ApiKey,
}

/// Mints keys and records their hashes.
#[derive(Clone)]
pub struct KeyIssuer {
    source: Arc<dyn RandomSource>,
}

impl Default for KeyIssuer {
    fn default() -> Self {
        Self::new(Arc::new(OsRandom))
    }
}

impl KeyIssuer {
    pub fn new(source: Arc<dyn RandomSource>) -> Self {
        Self { source }
    }

    /// Draw fresh key material and format it as a plaintext key.
    pub fn mint(&self) -> String {
        let mut bytes = [0u8; KEY_BYTES];
        self.source.fill_bytes(&mut bytes);
        format!("{KEY_PREFIX}{}", hex::encode(bytes))
    }

    /// Issue a new key for `owner_id`.
    ///
    /// # Process
    ///
    /// 1. Validate the name (trimmed, non-empty)
    /// 2. Mint 32 random bytes into a `ray_ai_sk_` key
    /// 3. Hash the full key string with SHA-256
    /// 4. Insert one row holding only the hash
    /// 5. Return the plaintext with the stored record
    ///
    /// # Errors
    ///
    /// - `Validation`: name is empty after trimming or too long
    /// - `Persistence`: the insert failed. The minted key is dropped and the caller should
    ///   retry the whole request; a hash collision is reported the same way, since a new draw
    ///   will not collide again.
    pub async fn generate_key(
        &self,
        store: &dyn ApiKeyStore,
        owner_id: Uuid,
        name: &str,
    ) -> Result<IssuedKey, AppError> {
        let name = validate_key_name(name)?;

        let plaintext = self.mint();
        let key_hash = hash_key(&plaintext);

        // Single attempt. Retrying with a new key could diverge from one already shown.
        let record = store
            .insert_api_key(owner_id, name, &key_hash)
            .await
            .map_err(|source| {
                if matches!(source, StoreError::Conflict) {
                    tracing::warn!(%owner_id, "key hash collided on insert");
                }
                AppError::Persistence {
                    action: "Creating the API key",
                    source,
                }
            })?;

        tracing::info!(%owner_id, key_id = %record.id, "API key issued");

        Ok(IssuedKey { plaintext, record })
    }
}

/// SHA-256 of the full key string, lowercase hex.
pub fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Trim and check a key name.
pub fn validate_key_name(name: &str) -> Result<&str, AppError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Key name is required and must be a non-empty string".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_KEY_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Key name must be at most {MAX_KEY_NAME_CHARS} characters"
        )));
    }

    Ok(trimmed)
}

/// Redacted form of a key for listings.
///
/// Built from the record id, not the key material, which is unrecoverable.
pub fn display_key(record: &ApiKey) -> String {
    let id = record.id.simple().to_string();
    format!("{KEY_PREFIX}{}{DISPLAY_MASK}", &id[..DISPLAY_ID_CHARS])
}

/// Check a candidate key against the keys `owner_id` holds.
///
/// Every stored hash is compared so the time taken does not depend on which one matched.
pub async fn verify_key(
    store: &dyn ApiKeyStore,
    candidate: &str,
    owner_id: Uuid,
) -> Result<bool, AppError> {
    let candidate_hash = hash_key(candidate);
    let keys = store.list_api_keys(owner_id).await?;

    let matched = keys.iter().fold(subtle::Choice::from(0), |acc, key| {
        acc | candidate_hash.as_bytes().ct_eq(key.key_hash.as_bytes())
    });

    Ok(bool::from(matched))
}

/// Cheap shape check on a presented key.
pub fn has_key_shape(candidate: &str) -> bool {
    candidate.starts_with(KEY_PREFIX)
        && (MIN_PRESENTED_KEY_LEN..=MAX_PRESENTED_KEY_LEN).contains(&candidate.len())
}

/// Resolve a presented bearer key to its record and stamp `last_used_at`.
///
/// A failed stamp is logged and ignored; it never fails the request.
pub async fn authenticate_api_key(
    store: &dyn ApiKeyStore,
    presented: &str,
) -> Result<ApiKey, AppError> {
    if !has_key_shape(presented) {
        return Err(AppError::InvalidApiKey);
    }

    let key = store
        .find_api_key_by_hash(&hash_key(presented))
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    if let Err(err) = store.touch_api_key(key.id).await {
        tracing::warn!(key_id = %key.id, error = %err, "failed to record key usage");
    }

    Ok(key)
}

/// Owner's keys, newest first.
pub async fn list_keys(store: &dyn ApiKeyStore, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
    Ok(store.list_api_keys(owner_id).await?)
}

/// Delete a key immediately. Not found if the key is absent or owned by someone else.
pub async fn revoke_key(
    store: &dyn ApiKeyStore,
    owner_id: Uuid,
    key_id: Uuid,
) -> Result<(), AppError> {
    let deleted = store
        .delete_api_key(owner_id, key_id)
        .await
        .map_err(|source| AppError::Persistence {
            action: "Revoking the API key",
            source,
        })?;

    if !deleted {
        return Err(AppError::ApiKeyNotFound);
    }

    tracing::info!(%owner_id, %key_id, "API key revoked");
    Ok(())
}
