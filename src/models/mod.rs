//! Data models representing database entities and API payloads.

/// API key model and request/response bodies
pub mod api_key;
/// Profile model and onboarding form
pub mod profile;
/// Session, principal and route decision types
pub mod session;
