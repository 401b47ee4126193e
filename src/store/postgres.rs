//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use uuid::Uuid;

use super::{ApiKeyStore, ProfileStore, StoreError};
use crate::db::DbPool;
use crate::models::{api_key::ApiKey, profile::OnboardingRequest, profile::Profile};

const API_KEY_COLUMNS: &str = "id, user_id, name, key_hash, created_at, last_used_at";

/// Store backed by the shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn insert_api_key(
        &self,
        owner_id: Uuid,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, StoreError> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "INSERT INTO api_key (user_id, name, key_hash) VALUES ($1, $2, $3) RETURNING {API_KEY_COLUMNS}"
        ))
        .bind(owner_id)
        .bind(name)
        .bind(key_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(key)
    }

    async fn list_api_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, StoreError> {
        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_key WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn delete_api_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, StoreError> {
        // Filter by owner as well so one principal cannot revoke another's key
        let result = sqlx::query("DELETE FROM api_key WHERE id = $1 AND user_id = $2")
            .bind(key_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StoreError> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_key WHERE key_hash = $1"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    async fn touch_api_key(&self, key_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_key SET last_used_at = NOW() WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn find_profile(&self, principal_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profile WHERE id = $1")
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn complete_onboarding(
        &self,
        principal_id: Uuid,
        form: &OnboardingRequest,
    ) -> Result<Profile, StoreError> {
        // COALESCE keeps earlier answers when a field is left out on resubmission
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profile (
                id,
                email,
                full_name,
                company,
                job_title,
                familiarity,
                build_plan,
                onboarding_completed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, true)
            ON CONFLICT (id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, profile.email),
                full_name = COALESCE(EXCLUDED.full_name, profile.full_name),
                company = COALESCE(EXCLUDED.company, profile.company),
                job_title = COALESCE(EXCLUDED.job_title, profile.job_title),
                familiarity = COALESCE(EXCLUDED.familiarity, profile.familiarity),
                build_plan = COALESCE(EXCLUDED.build_plan, profile.build_plan),
                onboarding_completed = true,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(principal_id)
        .bind(&form.email)
        .bind(&form.name)
        .bind(&form.company)
        .bind(&form.job_title)
        .bind(&form.familiarity)
        .bind(&form.build_plan)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }
}
