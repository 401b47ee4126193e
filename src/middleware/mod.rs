//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They authenticate requests and short-circuit the unauthorized ones.

/// Session and API key authentication middleware
pub mod auth;
