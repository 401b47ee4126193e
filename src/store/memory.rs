//! In-memory store for unit tests.
//!
//! Supports failure injection so the retry and degraded-path behavior of the services can be
//! exercised without a database.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{ApiKeyStore, ProfileStore, StoreError};
use crate::models::{api_key::ApiKey, profile::OnboardingRequest, profile::Profile};

#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: Mutex<Vec<ApiKey>>,
    profiles: Mutex<Vec<Profile>>,
    profile_lookups: AtomicU32,
    failing_profile_lookups: AtomicU32,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` profile lookups fail with [`StoreError::Unavailable`].
    pub fn fail_next_profile_lookups(&self, count: u32) {
        self.failing_profile_lookups.store(count, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn profile_lookups(&self) -> u32 {
        self.profile_lookups.load(Ordering::SeqCst)
    }

    pub fn stored_keys(&self) -> Vec<ApiKey> {
        self.keys.lock().unwrap().clone()
    }

    pub fn insert_profile(&self, id: Uuid, onboarding_completed: bool) {
        let now = Utc::now();
        self.profiles.lock().unwrap().push(Profile {
            id,
            email: None,
            full_name: None,
            company: None,
            job_title: None,
            familiarity: None,
            build_plan: None,
            onboarding_completed,
            created_at: now,
            updated_at: now,
        });
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn insert_api_key(
        &self,
        owner_id: Uuid,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert rejected".to_string()));
        }

        let mut keys = self.keys.lock().unwrap();
        if keys.iter().any(|k| k.key_hash == key_hash) {
            return Err(StoreError::Conflict);
        }

        let key = ApiKey {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
            key_hash: key_hash.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
        };
        keys.push(key.clone());
        Ok(key)
    }

    async fn list_api_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, StoreError> {
        let mut keys: Vec<ApiKey> = self
            .keys
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.owner_id == owner_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn delete_api_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, StoreError> {
        let mut keys = self.keys.lock().unwrap();
        let before = keys.len();
        keys.retain(|k| !(k.id == key_id && k.owner_id == owner_id));
        Ok(keys.len() < before)
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StoreError> {
        Ok(self
            .keys
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn touch_api_key(&self, key_id: Uuid) -> Result<(), StoreError> {
        if let Some(key) = self.keys.lock().unwrap().iter_mut().find(|k| k.id == key_id) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_profile(&self, principal_id: Uuid) -> Result<Option<Profile>, StoreError> {
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failing_profile_lookups.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_profile_lookups.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("profile lookup failed".to_string()));
        }

        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == principal_id)
            .cloned())
    }

    async fn complete_onboarding(
        &self,
        principal_id: Uuid,
        form: &OnboardingRequest,
    ) -> Result<Profile, StoreError> {
        let mut profiles = self.profiles.lock().unwrap();
        let now = Utc::now();

        if let Some(profile) = profiles.iter_mut().find(|p| p.id == principal_id) {
            profile.email = form.email.clone().or(profile.email.take());
            profile.full_name = form.name.clone().or(profile.full_name.take());
            profile.company = form.company.clone().or(profile.company.take());
            profile.job_title = form.job_title.clone().or(profile.job_title.take());
            profile.familiarity = form.familiarity.clone().or(profile.familiarity.take());
            profile.build_plan = form.build_plan.clone().or(profile.build_plan.take());
            profile.onboarding_completed = true;
            profile.updated_at = now;
            return Ok(profile.clone());
        }

        let profile = Profile {
            id: principal_id,
            email: form.email.clone(),
            full_name: form.name.clone(),
            company: form.company.clone(),
            job_title: form.job_title.clone(),
            familiarity: form.familiarity.clone(),
            build_plan: form.build_plan.clone(),
            onboarding_completed: true,
            created_at: now,
            updated_at: now,
        };
        profiles.push(profile.clone());
        Ok(profile)
    }
}
