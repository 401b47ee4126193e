//! Post-authentication routing.
//!
//! Decides whether a principal lands on onboarding or the dashboard. The OAuth callback, the
//! "already signed in" check and the session status endpoint all call into [`RouteResolver`]
//! so there is exactly one decision table.
//!
//! | Profile lookup                    | Decision         |
//! |-----------------------------------|------------------|
//! | found, onboarding completed       | `GoToDashboard`  |
//! | found, onboarding not completed   | `GoToOnboarding` |
//! | no row                            | `GoToOnboarding` |
//! | failed after all retries          | `GoToOnboarding` |

use std::time::Duration;

use uuid::Uuid;

use super::retry::{RetryPolicy, with_retry};
use super::session_service::{ProviderError, SessionProvider, validate_session};
use crate::models::session::{RouteDecision, Session, SessionValidity};
use crate::store::{ProfileStore, StoreError};

/// Default bound on a single profile lookup.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maps a principal to its next route.
#[derive(Debug, Clone, Copy)]
pub struct RouteResolver {
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl Default for RouteResolver {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl RouteResolver {
    pub fn new(policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            policy,
            attempt_timeout,
        }
    }

    /// Compute the route for `principal_id`. Never fails: lookup errors fall back to
    /// onboarding, which the user can always re-enter.
    pub async fn resolve_route(
        &self,
        profiles: &dyn ProfileStore,
        principal_id: Uuid,
    ) -> RouteDecision {
        let attempt_timeout = self.attempt_timeout;

        let lookup = with_retry(&self.policy, "profile_lookup", || async move {
            match tokio::time::timeout(attempt_timeout, profiles.find_profile(principal_id)).await
            {
                Ok(result) => result,
                Err(_) => Err(StoreError::Unavailable(format!(
                    "profile lookup exceeded {}ms",
                    attempt_timeout.as_millis()
                ))),
            }
        })
        .await;

        let decision = match lookup {
            Ok(Some(profile)) if profile.onboarding_completed => RouteDecision::GoToDashboard,
            Ok(_) => RouteDecision::GoToOnboarding,
            Err(err) => {
                tracing::warn!(
                    %principal_id,
                    error = %err,
                    "profile lookup failed after retries, falling back"
                );
                RouteDecision::GoToOnboarding
            }
        };

        tracing::info!(%principal_id, route = decision.as_str(), "route resolved");
        decision
    }

    /// Validate the caller's session and, when valid, resolve its route.
    ///
    /// Used by the sign-in page check and the session status endpoint.
    pub async fn resolve_current<P>(
        &self,
        provider: &P,
        profiles: &dyn ProfileStore,
    ) -> (SessionValidity, Option<RouteDecision>)
    where
        P: SessionProvider + ?Sized,
    {
        let validity = validate_session(provider).await;

        let route = match &validity.principal {
            Some(principal) if validity.is_valid => {
                Some(self.resolve_route(profiles, principal.id).await)
            }
            _ => None,
        };

        (validity, route)
    }

    /// OAuth callback: exchange the code, then route the principal behind the new session.
    ///
    /// `bind` turns the fresh session into a provider so the principal is fetched with the new
    /// credentials. Returns `None` for the route when the principal cannot be fetched.
    pub async fn complete_sign_in<P, Q, F>(
        &self,
        provider: &P,
        bind: F,
        profiles: &dyn ProfileStore,
        code: &str,
    ) -> Result<(Session, Option<RouteDecision>), ProviderError>
    where
        P: SessionProvider + ?Sized,
        Q: SessionProvider,
        F: FnOnce(&Session) -> Q,
    {
        let session = provider.exchange_code_for_session(code).await?;

        let route = match bind(&session).get_principal().await {
            Ok(principal) => Some(self.resolve_route(profiles, principal.id).await),
            Err(err) => {
                tracing::warn!(error = %err, "signed in but principal unavailable");
                None
            }
        };

        Ok((session, route))
    }
}
