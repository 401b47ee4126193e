//! Business logic layer.
//!
//! Services hold the rules for keys, sessions and routing. Handlers stay thin and call into here.

/// Hosted auth provider REST client
pub mod auth_provider;

/// API key generation, hashing and verification
pub mod key_service;

/// Bounded retry with exponential backoff
pub mod retry;

/// Onboarding vs dashboard routing
pub mod route_service;

/// Session validation against the auth provider
pub mod session_service;
