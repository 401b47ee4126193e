//! Session validation.
//!
//! Every entry point that needs to know "is this browser signed in?" calls
//! [`validate_session`]. The check fails closed: anything other than a readable session whose
//! principal still resolves is invalid.
//!
//! # State Machine
//!
//! ```text
//! Unchecked
//!   ├─ session fetch errors ─────────────────► Invalid(SessionCorrupted, sign out)
//!   ├─ no session ───────────────────────────► Invalid(NoSession)
//!   └─ session present
//!        ├─ principal not found ─────────────► Invalid(UserNotFound, sign out)
//!        ├─ principal fetch rejected ────────► Invalid(AuthError, sign out)
//!        └─ principal resolves ──────────────► Valid
//! provider unreachable at any step ─────────► Invalid(ValidationFailed, sign out)
//! ```

use async_trait::async_trait;

use crate::models::session::{Principal, Session, SessionReason, SessionValidity};

/// Notice shown once after a forced sign-out.
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please sign in again.";

/// Failure reported by the hosted auth provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The principal behind the session no longer exists.
    #[error("principal not found")]
    NotFound,

    /// The provider answered but refused the request.
    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Stored session or provider response could not be decoded.
    #[error("malformed session data: {0}")]
    Malformed(String),

    /// The provider could not be reached or timed out.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Hosted auth provider, bound to one request's stored session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The stored session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// The principal the stored session belongs to.
    async fn get_principal(&self) -> Result<Principal, ProviderError>;

    /// Complete an OAuth sign-in.
    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ProviderError>;

    /// Revoke the stored session with the provider.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Decide whether the caller holds a usable session.
pub async fn validate_session<P>(provider: &P) -> SessionValidity
where
    P: SessionProvider + ?Sized,
{
    match provider.get_session().await {
        Ok(Some(_)) => {}
        Ok(None) => return SessionValidity::invalid(SessionReason::NoSession),
        Err(ProviderError::Unavailable(err)) => {
            tracing::error!(error = %err, "session validation failed");
            return SessionValidity::invalid(SessionReason::ValidationFailed);
        }
        Err(err) => {
            tracing::warn!(error = %err, "stored session unreadable");
            return SessionValidity::invalid(SessionReason::SessionCorrupted);
        }
    }

    match provider.get_principal().await {
        Ok(principal) => SessionValidity::valid(principal),
        Err(ProviderError::NotFound) => {
            tracing::warn!("session outlived its principal");
            SessionValidity::invalid(SessionReason::UserNotFound)
        }
        Err(ProviderError::Unavailable(err)) => {
            tracing::error!(error = %err, "session validation failed");
            SessionValidity::invalid(SessionReason::ValidationFailed)
        }
        Err(err) => {
            tracing::warn!(error = %err, "principal fetch rejected");
            SessionValidity::invalid(SessionReason::AuthError)
        }
    }
}

/// Revoke the session with the provider when the verdict asks for it.
///
/// Best effort: a failing sign-out is logged, and the caller clears the cookie regardless.
/// Returns whether a sign-out was attempted.
pub async fn sign_out_if_required<P>(provider: &P, validity: &SessionValidity) -> bool
where
    P: SessionProvider + ?Sized,
{
    if !validity.should_sign_out {
        return false;
    }

    if let Err(err) = provider.sign_out().await {
        tracing::warn!(error = %err, "provider sign-out failed");
    }
    true
}
