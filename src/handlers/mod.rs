//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, cookies)
//! 2. Calls into the services
//! 3. Returns HTTP response (JSON, redirect, status code)

/// Sign-in, callback, sign-out and session status
pub mod auth;

/// Health check endpoint
pub mod health;

/// API key issuance, listing, revocation and verification
pub mod keys;

/// Onboarding form submission
pub mod onboarding;
