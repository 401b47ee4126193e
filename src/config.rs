//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

use crate::services::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `AUTH_URL` (required): Base URL of the hosted auth provider
/// - `AUTH_ANON_KEY` (required): Public key sent to the provider as `apikey`
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `SITE_URL` (optional): Origin used for redirects, defaults to `http://localhost:3000`
/// - `ENVIRONMENT` (optional): `development` (default) or anything else for production
/// - `PROFILE_LOOKUP_MAX_ATTEMPTS` (optional): defaults to 3
/// - `PROFILE_LOOKUP_BASE_DELAY_MS` (optional): defaults to 1000
/// - `PROFILE_LOOKUP_TIMEOUT_MS` (optional): per-attempt bound, defaults to 5000
/// - `AUTH_REQUEST_TIMEOUT_MS` (optional): per-call bound on the provider, defaults to 5000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `DATABASE_ACQUIRE_TIMEOUT_MS` (optional): wait for a pooled connection, defaults to 5000
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub auth_url: String,

    pub auth_anon_key: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_site_url")]
    pub site_url: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_max_attempts")]
    pub profile_lookup_max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub profile_lookup_base_delay_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub profile_lookup_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub auth_request_timeout_ms: u64,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_timeout_ms")]
    pub database_acquire_timeout_ms: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Retry policy for profile lookups during route resolution.
    pub fn profile_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.profile_lookup_max_attempts,
            Duration::from_millis(self.profile_lookup_base_delay_ms),
        )
    }

    pub fn profile_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_lookup_timeout_ms)
    }

    pub fn auth_request_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_request_timeout_ms)
    }
}
