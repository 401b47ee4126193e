//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::{auth_provider::HostedAuthClient, key_service::KeyIssuer, route_service::RouteResolver};
use crate::store::{ApiKeyStore, PgStore, ProfileStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub keys: Arc<dyn ApiKeyStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub auth: Arc<HostedAuthClient>,
    pub issuer: KeyIssuer,
    pub resolver: RouteResolver,
}

impl AppState {
    /// Wire the Postgres store, provider client and engines from configuration.
    pub fn new(pool: DbPool, config: Config, auth: HostedAuthClient) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        let resolver =
            RouteResolver::new(config.profile_retry_policy(), config.profile_lookup_timeout());

        Self {
            pool,
            keys: store.clone(),
            profiles: store,
            auth: Arc::new(auth),
            issuer: KeyIssuer::default(),
            resolver,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over an in-memory store, talking to the provider at `auth_url`.
    pub fn in_memory(store: Arc<crate::store::memory::MemoryStore>, auth_url: &str) -> Self {
        let config: Config = envy::from_iter(vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/ray".to_string()),
            ("AUTH_URL".to_string(), auth_url.to_string()),
            ("AUTH_ANON_KEY".to_string(), "anon".to_string()),
        ])
        .unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let auth =
            HostedAuthClient::new(auth_url, "anon", std::time::Duration::from_secs(1)).unwrap();

        Self {
            pool,
            config: Arc::new(config),
            keys: store.clone(),
            profiles: store,
            auth: Arc::new(auth),
            issuer: KeyIssuer::default(),
            resolver: RouteResolver::default(),
        }
    }
}
